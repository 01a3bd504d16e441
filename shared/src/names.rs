//! Hash names
//!
//! RW4 files refer to joints, skeletons and animations by the 32-bit FNV-1
//! hash of a lower-cased name. A [`NameRegistry`] maps hashes back to
//! readable names for export and turns names into hashes on import. It is
//! passed explicitly to whatever needs it; there is no global table.
//!
//! # Registry file format
//!
//! ```text
//! # comment
//! joint1              hash = fnv_hash("joint1")
//! root~<TAB>0x1234ABCD  alias with an explicit hash (decimal also accepted)
//! ```

use std::path::Path;

use hashbrown::HashMap;

const FNV_OFFSET_BASIS: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1 of the lower-cased name
pub fn fnv_hash(name: &str) -> u32 {
    name.to_lowercase()
        .bytes()
        .fold(FNV_OFFSET_BASIS, |h, b| h.wrapping_mul(FNV_PRIME) ^ u32::from(b))
}

/// Errors raised while loading a registry or resolving a name
#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("failed to read registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid hash value '{value}'")]
    InvalidRegistryHash { line: usize, value: String },
    #[error("invalid hash literal '{0}'")]
    InvalidHash(String),
    #[error("cannot hash name '{0}': ~ is reserved for aliases")]
    ReservedAlias(String),
}

/// Hash ↔ name conversion used by the interchange formats
pub trait NameLookup {
    /// Readable name for `hash`, or `#XXXXXXXX` when unknown
    fn to_name(&self, hash: u32) -> String;

    /// Hash for `name`: `#hex` and `0xhex` literals, registered aliases,
    /// then [`fnv_hash`]
    fn to_hash(&self, name: &str) -> Result<u32, NameError>;
}

/// Table of known names
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    hash_name: HashMap<u32, String>,
    /// Names whose hash is not their own FNV (aliases)
    name_hash: HashMap<String, u32>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry file into a fresh table
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NameError> {
        let mut registry = Self::new();
        registry.load_file(path, true)?;
        Ok(registry)
    }

    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        override_existing: bool,
    ) -> Result<Vec<u32>, NameError> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text, override_existing)
    }

    /// Parse registry text, returning the hashes that gained a name
    pub fn load_str(&mut self, text: &str, override_existing: bool) -> Result<Vec<u32>, NameError> {
        let mut added = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, hash) = match line.split_once('\t') {
                Some((name, value)) => {
                    let value = value.split('\t').next().unwrap_or(value).trim();
                    let hash = parse_registry_hash(value).ok_or_else(|| {
                        NameError::InvalidRegistryHash {
                            line: index + 1,
                            value: value.to_string(),
                        }
                    })?;
                    (name, hash)
                }
                None => (line, fnv_hash(line)),
            };

            if (override_existing || !self.name_hash.contains_key(name))
                && self.add_name(name, hash, override_existing)
            {
                added.push(hash);
            }
        }
        Ok(added)
    }

    /// Register `name` for `hash`.
    ///
    /// An existing true name (one whose FNV is the hash) is never replaced
    /// by an alias. Returns whether the hash now maps to `name`.
    pub fn add_name(&mut self, name: &str, hash: u32, override_existing: bool) -> bool {
        if hash != fnv_hash(name) {
            self.name_hash.insert(name.to_string(), hash);
        } else {
            self.name_hash.remove(name);
        }

        let replace = match self.hash_name.get(&hash) {
            None => true,
            Some(existing) => override_existing && fnv_hash(existing) != hash,
        };
        if replace {
            self.hash_name.insert(hash, name.to_string());
        }
        replace
    }

    pub fn len(&self) -> usize {
        self.hash_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_name.is_empty()
    }

    /// Serialize back to the registry text format, aliases with explicit hashes
    pub fn to_registry_string(&self) -> String {
        let mut names: Vec<&String> = self.hash_name.values().collect();
        names.sort();
        let mut out = String::new();
        for name in names {
            match self.name_hash.get(name.as_str()) {
                Some(hash) => out.push_str(&format!("{name}\t0x{hash:08X}\n")),
                None => {
                    out.push_str(name);
                    out.push('\n');
                }
            }
        }
        out
    }
}

impl NameLookup for NameRegistry {
    fn to_name(&self, hash: u32) -> String {
        match self.hash_name.get(&hash) {
            Some(name) => name.clone(),
            None => format!("#{hash:08X}"),
        }
    }

    fn to_hash(&self, name: &str) -> Result<u32, NameError> {
        if let Some(hex) = name.strip_prefix('#').or_else(|| name.strip_prefix("0x")) {
            return u32::from_str_radix(hex, 16).map_err(|_| NameError::InvalidHash(name.to_string()));
        }
        if let Some(&hash) = self.name_hash.get(name) {
            return Ok(hash);
        }
        if name.ends_with('~') {
            return Err(NameError::ReservedAlias(name.to_string()));
        }
        Ok(fnv_hash(name))
    }
}

fn parse_registry_hash(value: &str) -> Option<u32> {
    match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

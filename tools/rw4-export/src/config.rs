//! Tool configuration (rw4-export.toml)
//!
//! Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! [names]
//! registries = ["reg_file.txt"]
//!
//! [read]
//! decode_simple_meshes = false
//!
//! [batch]
//! file_name = "raw.rw4"
//!
//! [output]
//! mesh_file = "model.mesh.xml"
//! texture_file = "texture.dds"
//! skeleton_file = "model.skeleton.xml"
//! animation_file = "anim.xml"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use rw4_common::ReadOptions;
use rw4_shared::{NameRegistry, fnv_hash};

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "rw4-export.toml";

/// Generic joint names registered before any registry file
const GENERIC_JOINT_NAMES: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub names: NamesConfig,
    pub read: ReadConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    /// Hash-name registry files, loaded in order
    pub registries: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    pub decode_simple_meshes: bool,
}

impl ReadConfig {
    pub fn options(&self) -> ReadOptions {
        ReadOptions {
            decode_simple_meshes: self.decode_simple_meshes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// File name matched when walking a directory tree
    pub file_name: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            file_name: "raw.rw4".to_string(),
        }
    }
}

/// Names of the files written next to an unpacked RW4
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mesh_file: String,
    pub texture_file: String,
    pub skeleton_file: String,
    pub animation_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mesh_file: "model.mesh.xml".to_string(),
            texture_file: "texture.dds".to_string(),
            skeleton_file: "model.skeleton.xml".to_string(),
            animation_file: "anim.xml".to_string(),
        }
    }
}

impl Config {
    /// Load `path`, or the default file if it exists, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config: {:?}", path))
    }

    /// Name lookup context: `joint0..joint99`, `bone0..bone99`, then every
    /// configured registry
    pub fn name_registry(&self) -> Result<NameRegistry> {
        let mut names = NameRegistry::new();
        for i in 0..GENERIC_JOINT_NAMES {
            for prefix in ["joint", "bone"] {
                let name = format!("{prefix}{i}");
                names.add_name(&name, fnv_hash(&name), false);
            }
        }
        for path in &self.names.registries {
            let added = names
                .load_file(path, true)
                .with_context(|| format!("Failed to load name registry: {:?}", path))?;
            tracing::debug!("Loaded {} names from {:?}", added.len(), path);
        }
        Ok(names)
    }
}

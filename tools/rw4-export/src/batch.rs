//! Directory-wide unpacking with a failure tally

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use walkdir::WalkDir;

use rw4_shared::NameLookup;

use crate::config::Config;
use crate::error::error_code;
use crate::unpack::unpack_file;

#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub converted: usize,
    /// Failure count per error code
    pub errors: HashMap<String, usize>,
}

impl BatchReport {
    /// `Converted ok/total files.` followed by the tally, most frequent first
    pub fn summary(&self) -> String {
        let mut text = format!("Converted {}/{} files.", self.converted, self.total);
        if !self.errors.is_empty() {
            let mut errors: Vec<_> = self.errors.iter().collect();
            errors.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            text.push_str("\nErrors:");
            for (code, count) in errors {
                let _ = write!(text, "\n  {code}: {count}");
            }
        }
        text
    }
}

/// Every file under `root` named `file_name`, sorted
pub fn find_inputs(root: &Path, file_name: &str) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == OsStr::new(file_name))
        .map(|e| e.into_path())
        .collect();
    inputs.sort();
    inputs
}

/// Unpack every matching file under `root` next to itself
///
/// Each file is unpacked into a directory named after it with the
/// extension dropped (`a/raw.rw4` → `a/raw/`).
pub fn run_batch(root: &Path, config: &Config, names: &impl NameLookup) -> BatchReport {
    let inputs = find_inputs(root, &config.batch.file_name);
    let mut report = BatchReport {
        total: inputs.len(),
        ..BatchReport::default()
    };

    for input in &inputs {
        let output_dir = input.with_extension("");
        match unpack_file(input, &output_dir, config, names) {
            Ok(unpacked) => {
                report.converted += 1;
                if unpacked.animations.is_empty() {
                    tracing::info!("{:?}", input);
                } else {
                    tracing::info!("{:?}: {}", input, unpacked.animations.join(", "));
                }
            }
            Err(err) => {
                tracing::warn!("{:?}: {:#}", input, err);
                *report.errors.entry(error_code(&err)).or_insert(0) += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw4_shared::NameRegistry;

    #[test]
    fn test_find_inputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("b/c/raw.rw4"), b"").unwrap();
        std::fs::write(dir.path().join("a/raw.rw4"), b"").unwrap();
        std::fs::write(dir.path().join("a/other.rw4"), b"").unwrap();

        let inputs = find_inputs(dir.path(), "raw.rw4");
        assert_eq!(
            inputs,
            vec![dir.path().join("a/raw.rw4"), dir.path().join("b/c/raw.rw4")]
        );
    }

    #[test]
    fn test_failures_tallied_by_code() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["x", "y", "z"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        std::fs::write(dir.path().join("x/raw.rw4"), [b'x'; 64]).unwrap();
        std::fs::write(dir.path().join("y/raw.rw4"), [0u8; 40]).unwrap();
        std::fs::write(dir.path().join("z/raw.rw4"), b"").unwrap();

        let report = run_batch(dir.path(), &Config::default(), &NameRegistry::new());
        assert_eq!(report.total, 3);
        assert_eq!(report.converted, 0);
        assert_eq!(report.errors.get("H000"), Some(&2));
        assert_eq!(report.errors.get("EOF"), Some(&1));
    }

    #[test]
    fn test_summary() {
        let mut report = BatchReport {
            total: 5,
            converted: 2,
            ..BatchReport::default()
        };
        report.errors.insert("EX001".to_string(), 1);
        report.errors.insert("H000".to_string(), 2);
        assert_eq!(
            report.summary(),
            "Converted 2/5 files.\nErrors:\n  H000: 2\n  EX001: 1"
        );
    }
}

//! File-backed rule document store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cl_core::{RuleStore, StoreError};

pub struct FileRuleStore {
    path: PathBuf,
}

impl FileRuleStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RuleStore for FileRuleStore {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError(format!(
                "Failed to read '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError(format!("Failed to create '{}': {}", parent.display(), e))
                })?;
            }
        }
        fs::write(&self.path, bytes).map_err(|e| {
            StoreError(format!(
                "Failed to write '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

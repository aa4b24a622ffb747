//! Local filesystem action store.

use super::{ActionStore, StoreError};
use crate::record::ActionRecord;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Stores the queue snapshot as a JSON array in a single file.
///
/// Saves go to a sibling temp file which is synced and renamed over the
/// target, so a crash mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct LocalActionStore {
    path: PathBuf,
}

impl LocalActionStore {
    /// Create a store at `path`. Creates the parent directory if needed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(LocalActionStore { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ActionStore for LocalActionStore {
    fn load(&self) -> Result<Vec<ActionRecord>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, records: &[ActionRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::Io(e)),
            };
        }

        let encoded = serde_json::to_vec(records)?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

//! Tier B: the durable, crash-recoverable feature-state snapshot.
//!
//! Written atomically (write-to-temp, fsync, rename) so a crash mid-write
//! never leaves a torn file on disk, and a `.bak` copy of the previous
//! snapshot is kept for one-step rollback before every write.

use crate::error::StateError;
use std::fs;
use std::path::{Path, PathBuf};
use swarmforge_types::FeatureState;

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    /// Load the snapshot, falling back to the `.bak` copy if the primary
    /// file is absent or fails to parse.
    pub fn load(&self) -> Result<Option<FeatureState>, StateError> {
        match Self::try_load(&self.path)? {
            Some(state) => Ok(Some(state)),
            None => {
                let backup = self.backup_path();
                if backup.exists() {
                    tracing::warn!(path = %self.path.display(), "primary snapshot unreadable, using backup");
                    Self::try_load(&backup)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<FeatureState>, StateError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "snapshot failed to parse");
                Ok(None)
            }
        }
    }

    /// Persist `state`, rotating the current file to `.bak` first and then
    /// replacing it atomically via a temp file in the same directory.
    pub fn write(&self, state: &FeatureState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut temp, state)?;
        use std::io::Write;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;
        Ok(())
    }
}

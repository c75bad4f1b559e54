//! Per-scan working copy
//!
//! Each remote scan clones into its own `defectrisk-scan-<uuid>` directory
//! under the system temp dir. The directory is removed when the guard drops,
//! whether the scan succeeded, failed or panicked.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const PREFIX: &str = "defectrisk-scan-";

/// Owned temporary directory holding one cloned repository.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
}

impl WorkingCopy {
    /// Create a fresh, empty directory under the system temp dir.
    pub fn create() -> io::Result<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    /// Create a fresh, empty directory under `parent`.
    pub fn create_in(parent: &Path) -> io::Result<Self> {
        let path = parent.join(format!("{}{}", PREFIX, Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        debug!("Created working copy at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed working copy {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove working copy {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unique_and_removed_on_drop() {
        let parent = tempdir().expect("tempdir");
        let a = WorkingCopy::create_in(parent.path()).expect("create");
        let b = WorkingCopy::create_in(parent.path()).expect("create");
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PREFIX)));

        fs::write(a.path().join("file.py"), "x = 1\n").expect("write");
        let kept = a.path().to_path_buf();
        drop(a);
        assert!(!kept.exists());
        assert!(b.path().exists());
    }
}

use std::path::{Path, PathBuf};

use tailor_core::Result;
use tracing::warn;

use crate::crypt::write_private;

/// Cleartext file on disk that is removed when the guard drops,
/// on success and on every error path alike.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `contents` to `path` readable by the owner only.
    pub fn create(path: impl Into<PathBuf>, contents: &[u8]) -> Result<Self> {
        let path = path.into();
        write_private(&path, contents)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not remove scratch file");
            }
        }
    }
}

//! Locally materialized media handles.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempPath;

use crate::error::{ModelError, ModelResult};

/// A playable local copy of downloaded media.
///
/// The bytes live in a temp file that is deleted when the handle is revoked or
/// when the last clone is dropped, whichever comes first. Clones share the same
/// file, so revoking through one clone revokes it for all of them.
#[derive(Clone)]
pub struct LocalMedia {
    file: Arc<Mutex<Option<TempPath>>>,
    path: PathBuf,
    size_bytes: u64,
}

impl LocalMedia {
    /// Write `bytes` to a new `.mp4` temp file inside `dir`.
    pub fn materialize(dir: &Path, bytes: &[u8]) -> ModelResult<Self> {
        if bytes.is_empty() {
            return Err(ModelError::EmptyMedia);
        }

        let mut file = tempfile::Builder::new()
            .prefix("scene-")
            .suffix(".mp4")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();

        Ok(Self {
            file: Arc::new(Mutex::new(Some(temp_path))),
            path,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Path of the media file, or `None` once revoked.
    pub fn path(&self) -> Option<PathBuf> {
        if self.is_revoked() {
            None
        } else {
            Some(self.path.clone())
        }
    }

    /// Size of the downloaded payload.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn is_revoked(&self) -> bool {
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Delete the backing file. Revoking twice is a no-op.
    pub fn revoke(&self) -> ModelResult<()> {
        let taken = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(temp_path) = taken {
            temp_path.close()?;
        }
        Ok(())
    }
}

impl fmt::Debug for LocalMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMedia")
            .field("path", &self.path)
            .field("size_bytes", &self.size_bytes)
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

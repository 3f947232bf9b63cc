use crate::error::UploadError;
use std::io;
use std::path::{Path, PathBuf};

/// The directory the front-end stores uploaded files in.
///
/// Attachments are deleted once processed, so a path sent by a client is only accepted when
/// it resolves to a regular file inside this directory.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Create the directory if needed and pin its canonical location
    pub fn open(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            root: dir.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client supplied path, relative paths being taken from the upload directory.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, UploadError> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        // Symlinks and `..` are resolved before the containment check
        let resolved = candidate
            .canonicalize()
            .map_err(|_| UploadError::NotFound(path.to_path_buf()))?;

        if resolved == self.root || !resolved.starts_with(&self.root) {
            return Err(UploadError::OutsideUploads(path.to_path_buf()));
        }
        if !resolved.is_file() {
            return Err(UploadError::NotFound(path.to_path_buf()));
        }
        Ok(resolved)
    }
}

use anyhow::{anyhow, Context, Result};
use raznet::models::attachment::Attachment;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Storage for files the user attaches during a session.
///
/// The assistant deletes an uploaded PDF once it has been processed, so
/// every attachment is a copy made here and the user's own file is never
/// touched. Whatever is left over is removed with the directory.
pub struct Uploads {
    dir: TempDir,
}

impl Uploads {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("raznet-uploads-")
            .tempdir()
            .context("Failed to create the upload directory")?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Copy a file into the upload directory under a fresh name.
    pub fn stage(&self, source: &Path) -> Result<Attachment> {
        if !source.is_file() {
            return Err(anyhow!("No such file: {}", source.display()));
        }

        let target = self.unique_name(source);
        std::fs::copy(source, &target)
            .with_context(|| format!("Failed to upload {}", source.display()))?;

        tracing::debug!(source = %source.display(), target = %target.display(), "staged upload");
        Ok(Attachment::from_path(target))
    }

    fn unique_name(&self, source: &Path) -> PathBuf {
        let mut name = Uuid::new_v4().to_string();
        if let Some(ext) = source.extension().and_then(|ext| ext.to_str()) {
            name.push('.');
            name.push_str(ext);
        }
        self.dir.path().join(name)
    }
}

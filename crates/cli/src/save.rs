//! Saves downloads into a local directory.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flux_sync::mutation::SaveTarget;

pub struct DirectorySaveTarget {
    dir: PathBuf,
}

impl DirectorySaveTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a download named `file_name` is written to. Only the final
    /// path component of `file_name` is kept.
    pub fn path_for(&self, file_name: &str) -> io::Result<PathBuf> {
        Path::new(file_name)
            .file_name()
            .map(|name| self.dir.join(name))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unusable file name: {file_name:?}"),
                )
            })
    }
}

#[async_trait]
impl SaveTarget for DirectorySaveTarget {
    async fn save(&self, file_name: &str, content: Vec<u8>) -> io::Result<()> {
        let path = self.path_for(file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &content).await?;
        tracing::info!(path = %path.display(), bytes = content.len(), "Download saved");
        Ok(())
    }
}

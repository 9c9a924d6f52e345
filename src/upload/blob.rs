use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::is_unsafe_char;

/// Content store for uploaded artifacts, addressed by flat file name.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Make the store writable. Idempotent.
    async fn ensure_ready(&self) -> io::Result<()>;
    /// Write a new blob. Must fail with `ErrorKind::AlreadyExists` instead of overwriting.
    async fn put_new(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
    async fn get(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Flat artifact names only: no separators, no control characters, no leading dot.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.chars().any(is_unsafe_char)
}

/// Directory-backed blob store (the public `video` folder).
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn path_for(&self, name: &str) -> io::Result<PathBuf> {
        if !is_safe_name(name) {
            return Err(io::Error::new(ErrorKind::InvalidInput, format!("unsafe blob name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn ensure_ready(&self) -> io::Result<()> {
        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            // Lost a race with a concurrent creator; fine as long as it is a directory now
            Err(e) if e.kind() == ErrorKind::AlreadyExists && self.root.is_dir() => {
                debug!(target: "getit::upload", "blob root already exists: {}", self.root.display());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn put_new(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(name)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        debug!(target: "getit::upload", "wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn get(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.path_for(name)?;
        tokio::fs::read(path).await
    }
}

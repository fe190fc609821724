//! Local filesystem storage backend.
//!
//! Namespaces map to subdirectories of a configured root; files are regular
//! files directly inside a namespace directory. Namespaces are provisioned on
//! first list or upload rather than through a separate create call.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::warn;

use crate::atomic::write_atomic;
use crate::storage::{FileEntry, Stats, Storage, StorageError};

#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    limit: u64,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root, limit: 0 }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    fn namespace_dir(&self, ns: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(validate_segment(ns)?))
    }

    fn file_path(&self, ns: &str, file: &str) -> Result<PathBuf, StorageError> {
        let dir = self.namespace_dir(ns)?;
        Ok(dir.join(validate_segment(file)?))
    }

    /// Creates the namespace directory if it is missing. Two concurrent
    /// requests may both observe a missing namespace; the loser's
    /// already-exists outcome counts as success.
    async fn ensure_namespace(&self, ns: &str, dir: &Path) -> Result<(), StorageError> {
        match fs::create_dir(dir).await {
            Ok(()) => {
                warn!(ns, "namespace did not exist, created");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn stat(&self, ns: &str) -> Result<Stats, StorageError> {
        let dir = self.namespace_dir(ns)?;
        self.ensure_namespace(ns, &dir).await?;

        let mut reader = fs::read_dir(&dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                continue;
            }
            let mod_time = metadata
                .modified()
                .ok()
                .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            files.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
                mod_time,
            });
        }

        Ok(Stats {
            files,
            file_limit: self.limit,
        })
    }

    async fn fetch(&self, ns: &str, file: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        let path = self.file_path(ns, file)?;
        let bytes = fs::read(&path).await?;
        Ok((bytes, None))
    }

    async fn upload(&self, ns: &str, file: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.limit > 0 && bytes.len() as u64 > self.limit {
            return Err(StorageError::TooLarge {
                limit: self.limit,
                size: bytes.len() as u64,
            });
        }

        let path = self.file_path(ns, file)?;
        let dir = self.namespace_dir(ns)?;
        self.ensure_namespace(ns, &dir).await?;
        write_atomic(&path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, ns: &str, file: &str) -> Result<(), StorageError> {
        let path = self.file_path(ns, file)?;
        fs::remove_file(&path).await?;
        Ok(())
    }

    async fn delete_namespace(&self, ns: &str) -> Result<(), StorageError> {
        let dir = self.namespace_dir(ns)?;
        // remove_dir_all succeeds on a missing path on some platforms; a
        // nonexistent namespace must surface as NotFound instead.
        let metadata = fs::metadata(&dir).await?;
        if !metadata.is_dir() {
            return Err(StorageError::NotFound);
        }
        fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    fn set_limit(&mut self, max_bytes: u64) {
        self.limit = max_bytes;
    }
}

/// Accepts only a single normal path component: no separators, no `.`/`..`,
/// not empty. Keeps every namespace and file strictly under the root.
fn validate_segment(segment: &str) -> Result<&str, StorageError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == segment => Ok(segment),
        _ => Err(StorageError::InvalidName),
    }
}

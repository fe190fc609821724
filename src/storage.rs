//! Storage contract: the interface the HTTP layer depends on, independent of
//! the backing store.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::Arc;

/// One file inside a namespace. `mod_time` is unix seconds.
#[derive(Clone, Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub mod_time: i64,
}

/// Listing payload for a namespace. `file_limit` is the configured upload
/// ceiling in bytes, 0 when unbounded. Ordering of `files` is backend-defined.
#[derive(Clone, Debug, Serialize)]
pub struct Stats {
    pub files: Vec<FileEntry>,
    pub file_limit: u64,
}

/// Namespace-scoped file operations.
///
/// Implementations must be safe under arbitrary interleaving of requests to
/// the same namespace and file; they are not required to synchronize beyond
/// the atomicity the backing store provides.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Enumerates non-directory entries directly under the namespace,
    /// creating the namespace if it does not exist yet.
    async fn stat(&self, ns: &str) -> Result<Stats, StorageError>;

    /// Returns raw content and an optional mime type. When the mime type is
    /// absent the caller is expected to detect one itself.
    async fn fetch(&self, ns: &str, file: &str) -> Result<(Vec<u8>, Option<String>), StorageError>;

    /// Writes or overwrites a file, creating the namespace if needed.
    async fn upload(&self, ns: &str, file: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Removes one file. Missing namespace or file is `NotFound`.
    async fn delete(&self, ns: &str, file: &str) -> Result<(), StorageError>;

    /// Removes the namespace and all of its contents. Missing namespace is
    /// `NotFound`.
    async fn delete_namespace(&self, ns: &str) -> Result<(), StorageError>;

    /// Sets the upload size ceiling in bytes, 0 for unbounded. Read-only
    /// after startup.
    fn set_limit(&mut self, max_bytes: u64);
}

pub type SharedStorage = Arc<dyn Storage>;

#[derive(Debug)]
pub enum StorageError {
    /// Unknown namespace or file on a read/delete path.
    NotFound,
    /// Namespace or file name with separators or dot components.
    InvalidName,
    /// Upload exceeds the configured limit; carries both numbers for client
    /// diagnostics.
    TooLarge { limit: u64, size: u64 },
    Io(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "not found"),
            StorageError::InvalidName => write!(f, "invalid namespace or file name"),
            StorageError::TooLarge { limit, size } => {
                write!(f, "file too large: {size} bytes, limit is {limit}")
            }
            StorageError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound
        } else {
            StorageError::Io(err)
        }
    }
}

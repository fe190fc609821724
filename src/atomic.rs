//! Whole-file writes via a temp file and atomic rename.

use std::io;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Writes `bytes` to a unique temp file next to `target`, fsyncs, then
/// renames over the target. A reader never observes a partial file, and
/// concurrent writers resolve to exactly one complete payload.
pub async fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::other("target has no parent directory"))?;
    let base = target
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| "file".into());
    let temp_path = parent.join(format!(".{base}.tmp.{}", Uuid::new_v4()));

    let mut file = File::create(&temp_path).await?;
    let write_result = async {
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err);
    }

    if let Err(err) = fs::rename(&temp_path, target).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err);
    }

    Ok(())
}

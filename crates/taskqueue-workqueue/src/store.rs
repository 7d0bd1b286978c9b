//! JSON file helpers shared by the queue and the scheduler.
//!
//! Writes go to a hidden temporary file in the same directory and are
//! renamed into place, so readers never see a partial file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use uuid::Uuid;

use crate::error::WorkQueueError;

/// Read and decode one JSON file.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, WorkQueueError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| WorkQueueError::Storage(format!("Failed to read {:?}: {}", path, e)))?;

    serde_json::from_str(&content)
        .map_err(|e| WorkQueueError::Serialization(format!("Failed to decode {:?}: {}", path, e)))
}

/// Encode `value` as pretty JSON and atomically replace `path` with it.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), WorkQueueError> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| WorkQueueError::Serialization(format!("Failed to encode {:?}: {}", path, e)))?;

    let tmp = temp_path(path);
    fs::write(&tmp, content)
        .await
        .map_err(|e| WorkQueueError::Storage(format!("Failed to write {:?}: {}", tmp, e)))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        fs::remove_file(&tmp).await.ok();
        return Err(WorkQueueError::Storage(format!(
            "Failed to move {:?} into place: {}",
            path, e
        )));
    }
    Ok(())
}

/// Remove a file. A missing file is not an error.
pub(crate) async fn remove(path: &Path) -> Result<(), WorkQueueError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WorkQueueError::Storage(format!(
            "Failed to remove {:?}: {}",
            path, e
        ))),
    }
}

/// All `*.json` files directly inside `dir`, sorted by file name.
///
/// Hidden files (temporary writes) are skipped.
pub(crate) async fn list_json(dir: &Path) -> Result<Vec<PathBuf>, WorkQueueError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| WorkQueueError::Storage(format!("Failed to read {:?}: {}", dir, e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| WorkQueueError::Storage(format!("Failed to read entry in {:?}: {}", dir, e)))?
    {
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if !hidden && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("state");
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

//! Snapshot persistence for warm restarts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::entry::SnapshotState;
use super::store::{CacheError, CacheStore};

/// Snapshot error.
#[derive(Debug)]
pub enum SnapshotError {
  Io(std::io::Error),
  Serialize(serde_json::Error),
  Deserialize(serde_json::Error),
  Invalid(CacheError),
}

impl std::fmt::Display for SnapshotError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SnapshotError::Io(e) => write!(f, "IO error: {}", e),
      SnapshotError::Serialize(e) => write!(f, "serialization error: {}", e),
      SnapshotError::Deserialize(e) => write!(f, "deserialization error: {}", e),
      SnapshotError::Invalid(e) => write!(f, "{}", e),
    }
  }
}

impl std::error::Error for SnapshotError {}

/// Writes and restores cache images at a fixed path.
pub struct SnapshotManager {
  path: PathBuf,
}

impl SnapshotManager {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  /// Serialize the cache to the snapshot file. The image is written to a
  /// temp file and atomically renamed into place.
  pub async fn save(&self, store: &CacheStore) -> Result<usize, SnapshotError> {
    let state = store.snapshot_state();
    let count = state.data.len();
    let json = serde_json::to_vec_pretty(&state).map_err(SnapshotError::Serialize)?;

    let temp_path = self.path.with_extension("tmp");
    let mut file = File::create(&temp_path).await.map_err(SnapshotError::Io)?;
    file.write_all(&json).await.map_err(SnapshotError::Io)?;
    file.sync_all().await.map_err(SnapshotError::Io)?;
    drop(file);

    fs::rename(&temp_path, &self.path)
      .await
      .map_err(SnapshotError::Io)?;

    tracing::debug!(entries = count, path = %self.path.display(), "snapshot saved");
    Ok(count)
  }

  /// Load the snapshot file into the store, replacing its contents.
  pub async fn load(&self, store: &CacheStore) -> Result<usize, SnapshotError> {
    let bytes = fs::read(&self.path).await.map_err(SnapshotError::Io)?;
    let state: SnapshotState =
      serde_json::from_slice(&bytes).map_err(SnapshotError::Deserialize)?;
    let count = state.data.len();
    store.restore(state).map_err(SnapshotError::Invalid)?;

    tracing::info!(entries = count, path = %self.path.display(), "snapshot restored");
    Ok(count)
  }
}

/// Periodic snapshot task. Failures are logged and never stop the server.
pub async fn run_snapshot_task(store: Arc<CacheStore>, path: PathBuf, interval: Duration) {
  let manager = SnapshotManager::new(path);
  loop {
    tokio::time::sleep(interval).await;
    if let Err(e) = manager.save(&store).await {
      tracing::error!("failed to save snapshot: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> CacheStore {
    CacheStore::new(100, 1024, 64, 300)
  }

  #[tokio::test]
  async fn test_save_then_load_restores_contents() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path().join("backup.json"));

    let cache = store();
    cache.set("color", "blue".into()).unwrap();
    cache.set("shape", "round".into()).unwrap();
    assert_eq!(manager.save(&cache).await.unwrap(), 2);

    let fresh = store();
    assert_eq!(manager.load(&fresh).await.unwrap(), 2);
    assert_eq!(fresh.get("color"), Some("blue".to_string()));
    assert_eq!(fresh.get("shape"), Some("round".to_string()));
    assert_eq!(fresh.cumulative_bytes(), cache.cumulative_bytes());
  }

  #[tokio::test]
  async fn test_load_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path().join("nope.json"));
    assert!(matches!(
      manager.load(&store()).await,
      Err(SnapshotError::Io(_))
    ));
  }

  #[tokio::test]
  async fn test_load_garbage_is_a_deserialize_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");
    std::fs::write(&path, b"{not json").unwrap();
    assert!(matches!(
      SnapshotManager::new(&path).load(&store()).await,
      Err(SnapshotError::Deserialize(_))
    ));
  }

  #[tokio::test]
  async fn test_load_rejects_oversized_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path().join("backup.json"));

    let big = store();
    big.set("a", "1".into()).unwrap();
    big.set("b", "2".into()).unwrap();
    manager.save(&big).await.unwrap();

    let tiny = CacheStore::new(1, 1024, 64, 300);
    assert!(matches!(
      manager.load(&tiny).await,
      Err(SnapshotError::Invalid(_))
    ));
    assert!(tiny.is_empty());
  }
}

//! Server daemon: listener, admission control and background tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use super::config::ServerConfig;
use super::credentials::Credentials;
use super::session::{run_session, SessionContext};
use crate::cache::{run_snapshot_task, CacheStore, SnapshotManager};

/// Default snapshot file, relative to the working directory.
pub const SNAPSHOT_PATH: &str = "backup.json";

pub struct Daemon {
  config: ServerConfig,
  store: Arc<CacheStore>,
  credentials: Arc<Credentials>,
  snapshot_path: PathBuf,
}

impl Daemon {
  pub fn new(config: ServerConfig) -> Self {
    let pool = &config.pool_config;
    let store = Arc::new(CacheStore::new(
      pool.node_limit as usize,
      pool.cache_limit,
      pool.node_size,
      pool.time_to_live,
    ));
    let credentials = Arc::new(Credentials::new(
      config.user.clone(),
      config.password.clone(),
    ));
    Self {
      config,
      store,
      credentials,
      snapshot_path: PathBuf::from(SNAPSHOT_PATH),
    }
  }

  /// Override the snapshot file location.
  pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.snapshot_path = path.into();
    self
  }

  pub fn store(&self) -> &Arc<CacheStore> {
    &self.store
  }

  /// Restore state, bind the configured port and serve until the process
  /// exits.
  pub async fn run(&self) -> Result<(), anyhow::Error> {
    if !self.config.enable_encryption {
      tracing::warn!("enableEncryption is off; the wire protocol encrypts regardless");
    }

    let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
    tracing::info!(
      "cache server '{}' listening on port {}",
      self.config.name,
      self.config.port
    );
    self.serve(listener).await
  }

  /// Accept loop over an already-bound listener. Accept errors are logged
  /// and the loop continues.
  pub async fn serve(&self, listener: TcpListener) -> Result<(), anyhow::Error> {
    if self.config.pool_config.backup_on {
      self.restore_from_snapshot().await;

      let store = self.store.clone();
      let path = self.snapshot_path.clone();
      let cycle = Duration::from_millis(self.config.pool_config.backup_cycle);
      tokio::spawn(async move {
        run_snapshot_task(store, path, cycle).await;
      });
    }

    let semaphore = Arc::new(Semaphore::new(self.config.pool_config.max_conns as usize));
    let ctx = SessionContext {
      store: self.store.clone(),
      credentials: self.credentials.clone(),
      deadline: Duration::from_millis(self.config.pool_config.connection_timeout),
    };

    loop {
      let (stream, peer) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
          tracing::error!("error accepting connection: {}", e);
          continue;
        }
      };

      let semaphore = semaphore.clone();
      let ctx = ctx.clone();
      tokio::spawn(async move {
        // Admission: the session blocks here until a pool slot frees up.
        // The permit lives as long as the session task.
        let _permit = match semaphore.acquire_owned().await {
          Ok(permit) => permit,
          Err(_) => return,
        };
        if let Err(e) = run_session(stream, ctx).await {
          tracing::debug!(%peer, "session error: {}", e);
        }
      });
    }
  }

  /// Best-effort warm start. Any failure falls back to the fresh cache the
  /// store was built with.
  async fn restore_from_snapshot(&self) {
    let manager = SnapshotManager::new(&self.snapshot_path);
    match manager.load(&self.store).await {
      Ok(count) => {
        tracing::info!(entries = count, "warm start from snapshot");
      }
      Err(e) => {
        tracing::debug!("starting with an empty cache: {}", e);
      }
    }
  }
}

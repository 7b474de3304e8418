//! Server configuration file model.
//!
//! The on-disk form is JSON with the stable top-level keys `name`, `user`,
//! `password`, `port`, `enableEncryption` and `poolConfig`. Unknown fields
//! are ignored and missing fields fall back to defaults so old config files
//! keep loading across versions.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
  #[serde(default)]
  pub name: String,

  /// Hex SHA-256 digest of the user name, produced at init.
  #[serde(default)]
  pub user: String,

  /// Hex SHA-256 digest of the password, produced at init.
  #[serde(default)]
  pub password: String,

  #[serde(default = "default_port")]
  pub port: u16,

  #[serde(default = "default_true")]
  pub enable_encryption: bool,

  #[serde(default)]
  pub pool_config: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
  /// Upper bound on concurrent sessions.
  #[serde(default = "default_max_conns")]
  pub max_conns: u32,

  /// Per-operation socket deadline in milliseconds.
  #[serde(default = "default_connection_timeout", alias = "timeoutThreshold")]
  pub connection_timeout: u64,

  /// Enable the periodic snapshot.
  #[serde(default, rename = "backUpOn")]
  pub backup_on: bool,

  /// Snapshot period in milliseconds.
  #[serde(default = "default_backup_cycle", rename = "backUpCycle")]
  pub backup_cycle: u64,

  /// Default entry lifetime in seconds.
  #[serde(default = "default_time_to_live")]
  pub time_to_live: u64,

  /// Maximum number of simultaneous entries.
  #[serde(default = "default_node_limit")]
  pub node_limit: u64,

  /// Per-entry size limit in bytes (key + value).
  #[serde(default = "default_node_size")]
  pub node_size: u64,

  /// Whole-cache byte budget.
  #[serde(default = "default_cache_limit")]
  pub cache_limit: u64,

  /// Reserved; parsed but not enforced.
  #[serde(default = "default_idle_threshold")]
  pub idle_threshold: u64,
}

fn default_port() -> u16 {
  5051
}
fn default_true() -> bool {
  true
}
fn default_max_conns() -> u32 {
  15
}
fn default_connection_timeout() -> u64 {
  30_000
}
fn default_backup_cycle() -> u64 {
  300_000
}
fn default_time_to_live() -> u64 {
  300
}
fn default_node_limit() -> u64 {
  3_500
}
fn default_node_size() -> u64 {
  1_024
}
fn default_cache_limit() -> u64 {
  5_242_880
}
fn default_idle_threshold() -> u64 {
  3_600
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      max_conns: default_max_conns(),
      connection_timeout: default_connection_timeout(),
      backup_on: false,
      backup_cycle: default_backup_cycle(),
      time_to_live: default_time_to_live(),
      node_limit: default_node_limit(),
      node_size: default_node_size(),
      cache_limit: default_cache_limit(),
      idle_threshold: default_idle_threshold(),
    }
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      name: String::new(),
      user: String::new(),
      password: String::new(),
      port: default_port(),
      enable_encryption: true,
      pool_config: PoolConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    let config: ServerConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  /// Structural validation, fatal at startup.
  pub fn validate(&self) -> Result<(), anyhow::Error> {
    if self.port == 0 {
      anyhow::bail!("port must be in [1, 65535]");
    }
    if self.pool_config.max_conns == 0 {
      anyhow::bail!("maxConns must be at least 1");
    }
    if self.pool_config.connection_timeout == 0 {
      anyhow::bail!("connectionTimeout must be positive");
    }
    if self.pool_config.time_to_live == 0 {
      anyhow::bail!("timeToLive must be positive");
    }
    if self.pool_config.node_limit == 0 {
      anyhow::bail!("nodeLimit must be positive");
    }
    if self.pool_config.node_size == 0 {
      anyhow::bail!("nodeSize must be positive");
    }
    if self.pool_config.cache_limit == 0 {
      anyhow::bail!("cacheLimit must be positive");
    }
    if self.pool_config.node_size > self.pool_config.cache_limit {
      anyhow::bail!("nodeSize must not exceed cacheLimit");
    }
    if self.pool_config.backup_on && self.pool_config.backup_cycle == 0 {
      anyhow::bail!("backUpCycle must be positive when backUpOn is set");
    }
    Ok(())
  }
}

//! Cache entry and snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A live key/value pair with an absolute expiry instant.
///
/// The expiry is a UTC timestamp rather than a monotonic instant so that a
/// snapshot written to disk restores to the same deadline after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub value: String,
  pub expiry: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(value: String, expiry: DateTime<Utc>) -> Self {
    Self { value, expiry }
  }

  /// An entry is dead once its expiry instant has been reached.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expiry <= now
  }
}

/// Serializable image of the whole cache, written to the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotState {
  pub capacity: usize,
  pub cumulative_bytes: u64,
  pub node_time_to_live: u64,
  pub node_size: u64,
  pub limit_in_bytes: u64,
  pub data: HashMap<String, CacheEntry>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_expiry_boundary_is_a_miss() {
    let now = Utc::now();
    let entry = CacheEntry::new("v".into(), now);
    assert!(entry.is_expired(now));
    assert!(!entry.is_expired(now - Duration::seconds(1)));
    assert!(entry.is_expired(now + Duration::seconds(1)));
  }

  #[test]
  fn test_snapshot_state_json_field_names() {
    let state = SnapshotState {
      capacity: 10,
      cumulative_bytes: 0,
      node_time_to_live: 300,
      node_size: 1024,
      limit_in_bytes: 5_242_880,
      data: HashMap::new(),
    };
    let json = serde_json::to_value(&state).unwrap();
    assert!(json.get("cumulativeBytes").is_some());
    assert!(json.get("nodeTimeToLive").is_some());
    assert!(json.get("limitInBytes").is_some());
    assert!(json.get("data").is_some());
  }
}

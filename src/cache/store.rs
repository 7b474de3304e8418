//! Cache store implementation.

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::entry::{CacheEntry, SnapshotState};

/// Store operation error. The display strings are sent verbatim to clients
/// as the detail of an `ERR` reply.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
  /// A single entry exceeds the per-entry size limit.
  NodeTooLarge { max: u64 },
  /// Inserting would push the cache past its byte budget.
  CacheFull { max: u64 },
  /// A restored snapshot violates the configured invariants.
  Corrupt(String),
}

impl std::fmt::Display for CacheError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CacheError::NodeTooLarge { max } => {
        write!(f, "node byte limit exceeded. Max is: {}", max)
      }
      CacheError::CacheFull { max } => {
        write!(f, "cache byte limit exceeded. Max is: {}", max)
      }
      CacheError::Corrupt(msg) => write!(f, "corrupt snapshot: {}", msg),
    }
  }
}

impl std::error::Error for CacheError {}

struct StoreInner {
  entries: HashMap<String, CacheEntry>,
  cumulative_bytes: u64,
}

/// Concurrent map with capacity, per-entry expiry and byte accounting.
///
/// All accounting happens under the one write lock, so `cumulative_bytes`
/// always matches the live entries between operations. Reads take the shared
/// lock and only upgrade when they observe an expired entry.
pub struct CacheStore {
  capacity: usize,
  byte_limit: u64,
  node_size_limit: u64,
  time_to_live: Duration,
  inner: RwLock<StoreInner>,
}

fn entry_size(key: &str, value: &str) -> u64 {
  (key.len() + value.len()) as u64
}

impl CacheStore {
  pub fn new(capacity: usize, byte_limit: u64, node_size_limit: u64, ttl_secs: u64) -> Self {
    Self {
      capacity,
      byte_limit,
      node_size_limit,
      time_to_live: Duration::seconds(ttl_secs as i64),
      inner: RwLock::new(StoreInner {
        entries: HashMap::new(),
        cumulative_bytes: 0,
      }),
    }
  }

  /// Insert or overwrite an entry.
  ///
  /// The presence check, overwrite refund, byte-budget check, insert and
  /// capacity trim are one critical section; a rejected write leaves the
  /// cache exactly as it was.
  pub fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
    let incoming = entry_size(key, &value);
    if incoming > self.node_size_limit {
      return Err(CacheError::NodeTooLarge {
        max: self.node_size_limit,
      });
    }

    let mut inner = self.inner.write();

    // An overwrite refunds the existing entry's size before the budget
    // check; a key is never counted twice.
    let refund = inner
      .entries
      .get(key)
      .map(|e| entry_size(key, &e.value))
      .unwrap_or(0);
    if inner.cumulative_bytes - refund + incoming > self.byte_limit {
      return Err(CacheError::CacheFull {
        max: self.byte_limit,
      });
    }

    inner.cumulative_bytes = inner.cumulative_bytes - refund + incoming;
    inner.entries.insert(
      key.to_string(),
      CacheEntry::new(value, Utc::now() + self.time_to_live),
    );

    if inner.entries.len() > self.capacity {
      self.evict_one(&mut inner, key);
    }

    Ok(())
  }

  /// Single-victim capacity trim. Any live entry other than the one just
  /// inserted may be chosen; callers must not rely on the order.
  fn evict_one(&self, inner: &mut StoreInner, just_inserted: &str) {
    let victim = inner
      .entries
      .keys()
      .find(|k| k.as_str() != just_inserted)
      .cloned();
    if let Some(victim) = victim {
      if let Some(evicted) = inner.entries.remove(&victim) {
        inner.cumulative_bytes -= entry_size(&victim, &evicted.value);
        tracing::debug!(key = %victim, "evicted entry over capacity");
      }
    }
  }

  /// Look up a key. Expired entries are removed on sight and reported as a
  /// miss; this lazy sweep is the only reclamation besides delete and the
  /// capacity trim.
  pub fn get(&self, key: &str) -> Option<String> {
    let now = Utc::now();
    {
      let inner = self.inner.read();
      match inner.entries.get(key) {
        None => return None,
        Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
        Some(_) => {}
      }
    }

    // Expired on the read path: upgrade and re-check, since another writer
    // may have replaced the entry between the two locks.
    let mut inner = self.inner.write();
    if let Some(entry) = inner.entries.get(key) {
      if entry.is_expired(Utc::now()) {
        let size = entry_size(key, &entry.value);
        inner.entries.remove(key);
        inner.cumulative_bytes -= size;
      } else {
        return Some(entry.value.clone());
      }
    }
    None
  }

  /// Remove a key. Idempotent.
  pub fn delete(&self, key: &str) {
    let mut inner = self.inner.write();
    if let Some(entry) = inner.entries.remove(key) {
      inner.cumulative_bytes -= entry_size(key, &entry.value);
    }
  }

  /// Number of live entries (including not-yet-swept expired ones).
  pub fn len(&self) -> usize {
    self.inner.read().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.read().entries.is_empty()
  }

  /// Current byte accounting total.
  pub fn cumulative_bytes(&self) -> u64 {
    self.inner.read().cumulative_bytes
  }

  /// A consistent serialized view of the cache and its limits.
  pub fn snapshot_state(&self) -> SnapshotState {
    let inner = self.inner.read();
    SnapshotState {
      capacity: self.capacity,
      cumulative_bytes: inner.cumulative_bytes,
      node_time_to_live: self.time_to_live.num_seconds() as u64,
      node_size: self.node_size_limit,
      limit_in_bytes: self.byte_limit,
      data: inner.entries.clone(),
    }
  }

  /// Replace the entire contents from a snapshot.
  ///
  /// The restored map must satisfy this store's configured limits and match
  /// its own recorded byte count; anything else is rejected.
  pub fn restore(&self, state: SnapshotState) -> Result<(), CacheError> {
    let mut total = 0u64;
    for (key, entry) in &state.data {
      let size = entry_size(key, &entry.value);
      if size > self.node_size_limit {
        return Err(CacheError::Corrupt(format!(
          "entry '{}' exceeds node size limit {}",
          key, self.node_size_limit
        )));
      }
      total += size;
    }
    if state.data.len() > self.capacity {
      return Err(CacheError::Corrupt(format!(
        "{} entries exceed capacity {}",
        state.data.len(),
        self.capacity
      )));
    }
    if total > self.byte_limit {
      return Err(CacheError::Corrupt(format!(
        "{} bytes exceed cache limit {}",
        total, self.byte_limit
      )));
    }
    if total != state.cumulative_bytes {
      return Err(CacheError::Corrupt(format!(
        "recorded byte count {} does not match entries ({})",
        state.cumulative_bytes, total
      )));
    }

    let mut inner = self.inner.write();
    inner.entries = state.data;
    inner.cumulative_bytes = total;
    Ok(())
  }
}

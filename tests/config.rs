//! Configuration parsing, defaults and validation.

use burrow::server::ServerConfig;

fn parse(json: &str) -> ServerConfig {
  serde_json::from_str(json).unwrap()
}

// =============================================================================
// Defaults and field names
// =============================================================================

#[test]
fn test_empty_object_yields_defaults() {
  let config = parse("{}");
  assert_eq!(config.port, 5051);
  assert!(config.enable_encryption);
  assert_eq!(config.pool_config.max_conns, 15);
  assert_eq!(config.pool_config.connection_timeout, 30_000);
  assert!(!config.pool_config.backup_on);
  assert_eq!(config.pool_config.backup_cycle, 300_000);
  assert_eq!(config.pool_config.time_to_live, 300);
  assert_eq!(config.pool_config.node_limit, 3_500);
  assert_eq!(config.pool_config.node_size, 1_024);
  assert_eq!(config.pool_config.cache_limit, 5_242_880);
  assert_eq!(config.pool_config.idle_threshold, 3_600);
}

#[test]
fn test_full_document_parses() {
  let config = parse(
    r#"{
      "name": "prod-cache",
      "user": "0123abcd",
      "password": "feedbeef",
      "port": 6000,
      "enableEncryption": true,
      "poolConfig": {
        "maxConns": 3,
        "connectionTimeout": 1500,
        "backUpOn": true,
        "backUpCycle": 60000,
        "timeToLive": 30,
        "nodeLimit": 10,
        "nodeSize": 128,
        "cacheLimit": 4096,
        "idleThreshold": 600
      }
    }"#,
  );
  assert_eq!(config.name, "prod-cache");
  assert_eq!(config.port, 6000);
  assert_eq!(config.pool_config.max_conns, 3);
  assert_eq!(config.pool_config.connection_timeout, 1_500);
  assert!(config.pool_config.backup_on);
  assert_eq!(config.pool_config.backup_cycle, 60_000);
  assert_eq!(config.pool_config.time_to_live, 30);
  assert_eq!(config.pool_config.node_limit, 10);
  assert_eq!(config.pool_config.node_size, 128);
  assert_eq!(config.pool_config.cache_limit, 4_096);
  config.validate().unwrap();
}

#[test]
fn test_timeout_threshold_alias_accepted() {
  let config = parse(r#"{"poolConfig": {"timeoutThreshold": 5000}}"#);
  assert_eq!(config.pool_config.connection_timeout, 5_000);
}

#[test]
fn test_unknown_fields_are_ignored() {
  let config = parse(
    r#"{
      "name": "x",
      "futureOption": 42,
      "poolConfig": {"maxConns": 2, "experimental": {"nested": true}}
    }"#,
  );
  assert_eq!(config.name, "x");
  assert_eq!(config.pool_config.max_conns, 2);
}

#[test]
fn test_serialized_form_uses_wire_key_names() {
  let json = serde_json::to_value(ServerConfig::default()).unwrap();
  assert!(json.get("enableEncryption").is_some());
  let pool = json.get("poolConfig").unwrap();
  for key in [
    "maxConns",
    "connectionTimeout",
    "backUpOn",
    "backUpCycle",
    "timeToLive",
    "nodeLimit",
    "nodeSize",
    "cacheLimit",
    "idleThreshold",
  ] {
    assert!(pool.get(key).is_some(), "missing key {}", key);
  }
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_rejects_bad_values() {
  let mut config = ServerConfig::default();
  config.port = 0;
  assert!(config.validate().is_err());

  let mut config = ServerConfig::default();
  config.pool_config.max_conns = 0;
  assert!(config.validate().is_err());

  let mut config = ServerConfig::default();
  config.pool_config.node_size = config.pool_config.cache_limit + 1;
  assert!(config.validate().is_err());

  let mut config = ServerConfig::default();
  config.pool_config.time_to_live = 0;
  assert!(config.validate().is_err());

  let mut config = ServerConfig::default();
  config.pool_config.backup_on = true;
  config.pool_config.backup_cycle = 0;
  assert!(config.validate().is_err());
}

#[test]
fn test_defaults_validate() {
  ServerConfig::default().validate().unwrap();
}

// =============================================================================
// File loading
// =============================================================================

#[test]
fn test_from_file_roundtrip() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("config.json");
  std::fs::write(&path, r#"{"name": "disk", "port": 7001}"#).unwrap();

  let config = ServerConfig::from_file(&path).unwrap();
  assert_eq!(config.name, "disk");
  assert_eq!(config.port, 7001);
}

#[test]
fn test_from_file_rejects_invalid_config() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("config.json");
  std::fs::write(&path, r#"{"port": 0}"#).unwrap();
  assert!(ServerConfig::from_file(&path).is_err());

  assert!(ServerConfig::from_file(dir.path().join("missing.json")).is_err());

  std::fs::write(&path, "not json").unwrap();
  assert!(ServerConfig::from_file(&path).is_err());
}

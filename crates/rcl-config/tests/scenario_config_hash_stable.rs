//! Config hash stability
//!
//! Validates: the control document hash is a pure function of its merged
//! content.
//!
//! GREEN when:
//! - `load_layered_yaml_from_strings` called twice on the same inputs returns
//!   identical config_hash.
//! - Reordering keys within YAML doesn't change the hash (canonicalization).
//! - Different values produce different hashes.
//! - Overlay layers override base values and hash deterministically.

use rcl_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
version: 1
broker:
  timeout_ms: 5000
  read_retries: 3
limits_note: "unused"
policies:
  momentum:
    risk:
      max_risk_per_trade: 0.01
      min_risk_reward: 1.5
"#;

const BASE_YAML_REORDERED: &str = r#"
policies:
  momentum:
    risk:
      min_risk_reward: 1.5
      max_risk_per_trade: 0.01
limits_note: "unused"
broker:
  read_retries: 3
  timeout_ms: 5000
version: 1
"#;

const OVERLAY_YAML: &str = r#"
broker:
  timeout_ms: 250
policies:
  momentum:
    risk:
      max_risk_per_trade: 0.005
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_and_keeps_siblings() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let timeout = a.config_json.pointer("/broker/timeout_ms").and_then(|v| v.as_u64());
    assert_eq!(timeout, Some(250));
    let retries = a.config_json.pointer("/broker/read_retries").and_then(|v| v.as_u64());
    assert_eq!(retries, Some(3), "sibling keys survive the merge");

    let risk = a
        .config_json
        .pointer("/policies/momentum/risk/max_risk_per_trade")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!((risk - 0.005).abs() < 1e-12);
    let rr = a
        .config_json
        .pointer("/policies/momentum/risk/min_risk_reward")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!((rr - 1.5).abs() < 1e-12);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

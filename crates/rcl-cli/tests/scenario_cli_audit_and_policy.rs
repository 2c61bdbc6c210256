//! CLI audit and policy state inspection
//!
//! Validates: `rcl audit-verify` detects a tampered policy audit log and
//! `rcl policy-show` prints the persisted policy state.
//!
//! GREEN when:
//! - A chain written by the policy store verifies, with its line count.
//! - Editing one record makes audit-verify exit non-zero naming the line.
//! - policy-show reflects a lock applied through the store.
//! - policy-show fails when no state file exists.

use assert_cmd::Command;
use predicates::prelude::*;
use rcl_audit::AuditLog;
use rcl_config::load_layered_yaml_from_strings;
use rcl_policy::RiskPolicyStore;

const DOC: &str = r#"
version: 1
policies:
  momentum:
    risk: { max_risk_per_trade: 0.01, min_risk_reward: 1.5 }
    limits: { max_concurrent_positions: 3, max_trades_per_day: 10 }
    protection: { breakeven_threshold: 0.005, trail_activation: 0.01, trail_distance: 0.008 }
"#;

/// Open a store (seeding writes the first audit record), then lock momentum.
fn seed_store(dir: &std::path::Path) {
    let doc = load_layered_yaml_from_strings(&[DOC]).unwrap().document().unwrap();
    let audit = AuditLog::open(dir.join("audit.jsonl"), true).unwrap();
    let store = RiskPolicyStore::open(&doc, dir.join("state.json"), audit, None).unwrap();
    store.lock("momentum").unwrap();
}

#[test]
fn audit_verify_accepts_an_intact_chain() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());

    Command::cargo_bin("rcl")
        .unwrap()
        .arg("audit-verify")
        .arg(dir.path().join("audit.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("audit_chain=valid"));
}

#[test]
fn audit_verify_fails_on_tampered_record() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());
    let path = dir.path().join("audit.jsonl");

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    assert!(!lines.is_empty());
    let mut ev: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    ev["payload"] = serde_json::json!({ "forged": true });
    lines[0] = serde_json::to_string(&ev).unwrap();
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    Command::cargo_bin("rcl")
        .unwrap()
        .arg("audit-verify")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("audit_chain=broken line=1"));
}

#[test]
fn policy_show_prints_persisted_lock() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());

    Command::cargo_bin("rcl")
        .unwrap()
        .args(["policy-show", "--state"])
        .arg(dir.path().join("state.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("policy=momentum enabled=true locked=true"))
        .stdout(predicate::str::contains("max_trades_per_day=10"));
}

#[test]
fn policy_show_without_state_fails() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("rcl")
        .unwrap()
        .args(["policy-show", "--state"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no policy state"));
}

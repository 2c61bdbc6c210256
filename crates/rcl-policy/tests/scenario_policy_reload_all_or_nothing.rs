//! Policy hot reload is all or nothing
//!
//! Validates: `reload` applies a changed control document atomically and
//! refuses any document that changes or removes a locked policy.
//!
//! GREEN when:
//! - A reload touching an unlocked policy updates it and reports it changed.
//! - A reload that also changes a locked policy fails with
//!   `LockedPolicyMismatch` and leaves every policy (locked or not) as it was.
//! - Removing a locked policy from the document is refused.
//! - Reloading an identical document is a no-op.

use rcl_audit::AuditLog;
use rcl_config::{load_layered_yaml_from_strings, ControlDocument};
use rcl_policy::{PolicyError, RiskPolicyStore};

const BASE: &str = r#"
version: 1
policies:
  momentum:
    risk: { max_risk_per_trade: 0.01, min_risk_reward: 1.5 }
    limits: { max_concurrent_positions: 3, max_trades_per_day: 10 }
    protection: { breakeven_threshold: 0.005, trail_activation: 0.01, trail_distance: 0.008 }
  gold_long:
    locked: true
    risk: { max_risk_per_trade: 0.005, min_risk_reward: 2.0 }
    limits: { max_concurrent_positions: 2, max_trades_per_day: 4 }
    protection: { breakeven_threshold: 0.004, trail_activation: 0.008, trail_distance: 0.006 }
"#;

fn doc(layers: &[&str]) -> ControlDocument {
    load_layered_yaml_from_strings(layers).unwrap().document().unwrap()
}

fn open(dir: &std::path::Path) -> RiskPolicyStore {
    let audit = AuditLog::open(dir.join("audit.jsonl"), true).unwrap();
    RiskPolicyStore::open(&doc(&[BASE]), dir.join("state.json"), audit, None).unwrap()
}

#[test]
fn reload_updates_unlocked_policy() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let overlay = "policies:\n  momentum:\n    limits: { max_trades_per_day: 6 }\n";
    let summary = store.reload(&doc(&[BASE, overlay])).unwrap();
    assert_eq!(summary.changed, vec!["momentum".to_string()]);
    assert_eq!(store.get_policy("momentum").unwrap().limits.max_trades_per_day, 6);
}

#[test]
fn reload_touching_locked_policy_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    let before = store.policies();

    let overlay = r#"
policies:
  momentum:
    limits: { max_trades_per_day: 6 }
  gold_long:
    risk: { max_risk_per_trade: 0.02 }
"#;
    let err = store.reload(&doc(&[BASE, overlay])).unwrap_err();
    match err {
        PolicyError::LockedPolicyMismatch { policy, .. } => assert_eq!(policy, "gold_long"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*store.policies(), *before, "no partial application");
}

#[test]
fn removing_locked_policy_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let only_momentum = r#"
version: 1
policies:
  momentum:
    risk: { max_risk_per_trade: 0.01, min_risk_reward: 1.5 }
    limits: { max_concurrent_positions: 3, max_trades_per_day: 10 }
    protection: { breakeven_threshold: 0.005, trail_activation: 0.01, trail_distance: 0.008 }
"#;
    let err = store.reload(&doc(&[only_momentum])).unwrap_err();
    assert!(matches!(err, PolicyError::LockedPolicyMismatch { .. }), "{err}");
    assert!(store.get_policy("gold_long").is_some());
}

#[test]
fn identical_reload_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    let trail = store.audit_trail().unwrap().len();
    let summary = store.reload(&doc(&[BASE])).unwrap();
    assert!(summary.is_noop());
    assert_eq!(store.audit_trail().unwrap().len(), trail);
}

//! Audit resume after restart
//!
//! Validates: reopening an existing audit log continues the same chain.
//!
//! GREEN when:
//! - A second writer on the same file starts at the next seq and links its
//!   first record to the previous writer's last hash.
//! - The combined file verifies as one intact chain.
//! - Each writer has its own session id.

use rcl_audit::{read_events, verify_hash_chain, AuditLog, VerifyResult};
use serde_json::json;

#[test]
fn reopened_log_extends_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("audit.jsonl");

    let (first_session, last_hash) = {
        let mut log = AuditLog::open(&path, true).unwrap();
        log.append("policy", "lock", json!({"policy": "momentum"})).unwrap();
        log.append("policy", "unlock", json!({"policy": "momentum"})).unwrap();
        (log.session_id(), log.last_hash().map(str::to_string))
    };

    let mut log = AuditLog::open(&path, true).unwrap();
    assert_eq!(log.seq(), 2);
    assert_eq!(log.last_hash().map(str::to_string), last_hash);
    assert_ne!(log.session_id(), first_session);

    let ev = log.append("policy", "disable", json!({"policy": "momentum"})).unwrap();
    assert_eq!(ev.seq, 2);
    assert_eq!(ev.hash_prev, last_hash);

    assert_eq!(verify_hash_chain(&path).unwrap(), VerifyResult::Valid { lines: 3 });

    let events = read_events(&path).unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["lock", "unlock", "disable"]);
}

#[test]
fn missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_events(dir.path().join("nope.jsonl")).unwrap().is_empty());
}

#[test]
fn corrupt_last_record_refuses_to_resume() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    std::fs::write(&path, "{not json}\n").unwrap();
    assert!(AuditLog::open(&path, true).is_err());
}

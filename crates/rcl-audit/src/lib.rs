//! rcl-audit
//!
//! Append-only JSON Lines audit log with an optional SHA-256 hash chain.
//! Each record carries `hash_prev` (the previous record's `hash_self`) and
//! `hash_self` (hash of its own canonical JSON without `hash_self`).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// One per process lifetime of the writer.
    pub session_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only audit writer.
///
/// Opening an existing file resumes the chain from its last record, so a
/// restarted process keeps extending one verifiable chain.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    hash_chain: bool,
    session_id: Uuid,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditLog {
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create_dir_all {:?}", parent))?;
            }
        }

        let (last_hash, seq) = match fs::read_to_string(&path) {
            Ok(content) => match content.lines().rev().find(|l| !l.trim().is_empty()) {
                Some(last) => {
                    let ev: AuditEvent = serde_json::from_str(last.trim())
                        .with_context(|| format!("audit log {:?} has a corrupt last record", path))?;
                    (ev.hash_self, ev.seq + 1)
                }
                None => (None, 0),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (None, 0),
            Err(e) => return Err(e).with_context(|| format!("read audit log {:?}", path)),
        };

        if hash_chain && seq > 0 && last_hash.is_none() {
            bail!("audit log {:?} was written without a hash chain; cannot resume chained", path);
        }

        let session_id = Uuid::new_v4();
        tracing::debug!(path = %path.display(), seq, %session_id, "audit log opened");

        Ok(Self {
            path,
            hash_chain,
            session_id,
            last_hash,
            seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Sequence number the next record will get.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Append one record. The record is on disk when this returns `Ok`.
    pub fn append(&mut self, topic: &str, event_type: &str, payload: Value) -> Result<AuditEvent> {
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;

        let mut ev = AuditEvent {
            event_id,
            session_id: self.session_id,
            seq: self.seq,
            ts_utc: Utc::now(),
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            ev.hash_self = Some(compute_event_hash(&ev)?);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        // Advance chain state only once the line is durable.
        self.seq += 1;
        if self.hash_chain {
            self.last_hash = ev.hash_self.clone();
        }
        Ok(ev)
    }
}

/// Read every record of an audit log, oldest first. A missing file is an
/// empty log.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read audit log {:?}", path)),
    };
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l.trim()).with_context(|| format!("parse audit event at line {}", i + 1))
        })
        .collect()
}

/// Event ids are derived from chain position and payload, never random, so
/// the same history always carries the same ids.
fn derive_event_id(prev_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("GENESIS").as_bytes());
    hasher.update(seq.to_be_bytes());
    hasher.update(canonical_json_line(payload)?.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes()).context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    f.sync_data().context("fsync audit log failed")?;
    Ok(())
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash of the canonical JSON of `ev` with `hash_self` cleared.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same as [`verify_hash_chain`] over in-memory JSONL content.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut expected_seq: Option<u64> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = match serde_json::from_str(trimmed) {
            Ok(ev) => ev,
            Err(e) => {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("unparseable record: {e}"),
                })
            }
        };
        line_count += 1;

        if let Some(seq) = expected_seq {
            if ev.seq != seq {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!("seq gap: expected {seq}, got {}", ev.seq),
                });
            }
        }
        expected_seq = Some(ev.seq + 1);

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        match ev.hash_self {
            Some(ref claimed) => {
                let recomputed = compute_event_hash(&ev)?;
                if *claimed != recomputed {
                    return Ok(VerifyResult::Broken {
                        line: i + 1,
                        reason: format!(
                            "hash_self mismatch: claimed {}, recomputed {}",
                            claimed, recomputed
                        ),
                    });
                }
            }
            None => {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: "missing hash_self".to_string(),
                })
            }
        }

        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}

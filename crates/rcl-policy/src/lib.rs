//! rcl-policy
//!
//! [`RiskPolicyStore`]: named, lockable per-strategy risk policies.
//!
//! Reads are lock-free in practice: a reader clones the current `Arc`
//! snapshot and works on that. Writers serialize on one mutex, build a new
//! map, persist it (atomic state file), append a hash-chained audit record,
//! and only then publish the new snapshot. A mutation that fails at any step
//! is invisible.

mod error;
mod state;

pub use error::PolicyError;
pub use state::{load_state, PersistedPolicy, PolicyState};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rcl_audit::{AuditEvent, AuditLog};
use rcl_config::{ControlDocument, RiskPolicy, POLICY_SECTIONS};
use rcl_schemas::{ControlEvent, EventBus};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use state::{write_state_atomic, STATE_VERSION};

pub type PolicyMap = BTreeMap<String, Arc<RiskPolicy>>;

const AUDIT_TOPIC: &str = "policy";

struct Writer {
    state_path: PathBuf,
    seeds: BTreeMap<String, String>,
    audit: AuditLog,
}

pub struct RiskPolicyStore {
    snapshot: RwLock<Arc<PolicyMap>>,
    writer: Mutex<Writer>,
    events: Option<EventBus>,
}

/// Outcome of a successful [`RiskPolicyStore::reload`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

impl RiskPolicyStore {
    /// Seed from `document` and reconcile with the persisted state at
    /// `state_path`. A locked persisted policy that disagrees with the
    /// document is fatal.
    pub fn open(
        document: &ControlDocument,
        state_path: impl AsRef<Path>,
        audit: AuditLog,
        events: Option<EventBus>,
    ) -> Result<Self, PolicyError> {
        let state_path = state_path.as_ref().to_path_buf();
        let persisted = load_state(&state_path).map_err(PolicyError::Persist)?;
        let had_state = persisted.is_some();
        let current = persisted.map(|s| s.policies).unwrap_or_default();

        let plan = reconcile(&document.policies, &current)?;

        let store = Self {
            snapshot: RwLock::new(Arc::new(PolicyMap::new())),
            writer: Mutex::new(Writer {
                state_path,
                seeds: BTreeMap::new(),
                audit,
            }),
            events,
        };

        {
            let mut w = store.writer.lock();
            if plan.summary.is_noop() && had_state {
                // Nothing to persist; publish the persisted state as-is.
                w.seeds = plan.next.iter().map(|(k, p)| (k.clone(), p.seed_hash.clone())).collect();
                *store.snapshot.write() = Arc::new(to_map(&plan.next));
            } else {
                let records = reseed_records(&plan.summary, &current, &plan.next, "open");
                store.commit(&mut w, plan.next, records)?;
            }
        }

        info!(
            policies = store.snapshot.read().len(),
            "risk policy store opened"
        );
        Ok(store)
    }

    pub fn get_policy(&self, name: &str) -> Option<Arc<RiskPolicy>> {
        self.snapshot.read().get(name).cloned()
    }

    /// Consistent snapshot of every policy.
    pub fn policies(&self) -> Arc<PolicyMap> {
        self.snapshot.read().clone()
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.get_policy(name).map(|p| p.locked).unwrap_or(false)
    }

    /// Change one numeric/boolean parameter in `section`. Fails closed when
    /// the policy is locked.
    pub fn update_parameter(
        &self,
        name: &str,
        section: &str,
        key: &str,
        value: Value,
    ) -> Result<Arc<RiskPolicy>, PolicyError> {
        self.mutate(name, "update_parameter", |current| {
            if current.locked {
                return Err(PolicyError::Locked(name.to_string()));
            }
            let unknown = || PolicyError::UnknownParameter {
                policy: name.to_string(),
                section: section.to_string(),
                key: key.to_string(),
            };
            if !POLICY_SECTIONS.contains(&section) {
                return Err(unknown());
            }

            let mut doc = serde_json::to_value(current).map_err(|e| PolicyError::Persist(e.into()))?;
            let slot = doc
                .get_mut(section)
                .and_then(|s| s.get_mut(key))
                .ok_or_else(unknown)?;
            let old_value = std::mem::replace(slot, value.clone());

            let parameter = format!("{section}.{key}");
            let next: RiskPolicy =
                serde_json::from_value(doc).map_err(|e| PolicyError::InvalidValue {
                    policy: name.to_string(),
                    parameter: parameter.clone(),
                    reason: e.to_string(),
                })?;
            next.validate(name).map_err(|e| PolicyError::InvalidValue {
                policy: name.to_string(),
                parameter,
                reason: e.to_string(),
            })?;

            Ok(Some((
                next,
                json!({
                    "section": section,
                    "key": key,
                    "old_value": old_value,
                    "new_value": value,
                }),
            )))
        })
    }

    /// Idempotent.
    pub fn lock(&self, name: &str) -> Result<Arc<RiskPolicy>, PolicyError> {
        self.mutate(name, "lock", |current| {
            if current.locked {
                return Ok(None);
            }
            let mut next = current.clone();
            next.locked = true;
            Ok(Some((next, flag_change("locked", false, true))))
        })
    }

    pub fn unlock(&self, name: &str) -> Result<Arc<RiskPolicy>, PolicyError> {
        self.mutate(name, "unlock", |current| {
            if !current.locked {
                return Ok(None);
            }
            let mut next = current.clone();
            next.locked = false;
            Ok(Some((next, flag_change("locked", true, false))))
        })
    }

    /// Allowed on a locked policy.
    pub fn enable(&self, name: &str) -> Result<Arc<RiskPolicy>, PolicyError> {
        self.mutate(name, "enable", |current| {
            if current.enabled {
                return Ok(None);
            }
            let mut next = current.clone();
            next.enabled = true;
            Ok(Some((next, flag_change("enabled", false, true))))
        })
    }

    pub fn disable(&self, name: &str) -> Result<Arc<RiskPolicy>, PolicyError> {
        self.mutate(name, "disable", |current| {
            if current.locked {
                return Err(PolicyError::Locked(name.to_string()));
            }
            if !current.enabled {
                return Ok(None);
            }
            let mut next = current.clone();
            next.enabled = false;
            Ok(Some((next, flag_change("enabled", true, false))))
        })
    }

    /// Apply a new control document. All or nothing: a locked policy that
    /// the document changes or removes aborts the whole reload.
    pub fn reload(&self, document: &ControlDocument) -> Result<ReloadSummary, PolicyError> {
        let mut w = self.writer.lock();
        let current: BTreeMap<String, PersistedPolicy> = self
            .snapshot
            .read()
            .iter()
            .map(|(name, p)| {
                let seed_hash = w.seeds.get(name).cloned().unwrap_or_default();
                (
                    name.clone(),
                    PersistedPolicy {
                        policy: (**p).clone(),
                        seed_hash,
                    },
                )
            })
            .collect();

        let plan = match reconcile(&document.policies, &current) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "policy reload rejected");
                return Err(e);
            }
        };
        if plan.summary.is_noop() {
            return Ok(plan.summary);
        }

        let records = reseed_records(&plan.summary, &current, &plan.next, "reload");
        let summary = plan.summary.clone();
        let events: Vec<ControlEvent> = summary
            .changed
            .iter()
            .chain(summary.removed.iter())
            .map(|policy| ControlEvent::PolicyUpdated {
                policy: policy.clone(),
                action: "reload".to_string(),
                ts_utc: Utc::now(),
            })
            .collect();
        self.commit(&mut w, plan.next, records)?;
        drop(w);

        for ev in events {
            self.publish(ev);
        }
        info!(changed = ?summary.changed, removed = ?summary.removed, "risk policies reloaded");
        Ok(summary)
    }

    /// Every policy audit record, oldest first.
    pub fn audit_trail(&self) -> Result<Vec<AuditEvent>, PolicyError> {
        let path = self.writer.lock().audit.path().to_path_buf();
        let events = rcl_audit::read_events(&path).map_err(PolicyError::Persist)?;
        Ok(events.into_iter().filter(|e| e.topic == AUDIT_TOPIC).collect())
    }

    // -----------------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------------

    fn mutate<F>(&self, name: &str, action: &str, f: F) -> Result<Arc<RiskPolicy>, PolicyError>
    where
        F: FnOnce(&RiskPolicy) -> Result<Option<(RiskPolicy, Value)>, PolicyError>,
    {
        let mut w = self.writer.lock();
        let snapshot = self.snapshot.read().clone();
        let current = snapshot
            .get(name)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_string()))?;

        let (next, detail) = match f(&current) {
            Ok(Some(change)) => change,
            Ok(None) => return Ok(current),
            Err(e) => {
                warn!(policy = name, action, error = %e, "policy mutation refused");
                return Err(e);
            }
        };

        let mut map: BTreeMap<String, PersistedPolicy> = snapshot
            .iter()
            .map(|(k, p)| {
                (
                    k.clone(),
                    PersistedPolicy {
                        policy: (**p).clone(),
                        seed_hash: w.seeds.get(k).cloned().unwrap_or_default(),
                    },
                )
            })
            .collect();
        if let Some(entry) = map.get_mut(name) {
            entry.policy = next;
        }

        let mut payload = json!({
            "policy": name,
            "action": action,
            "ts_utc": Utc::now(),
        });
        if let (Some(obj), Value::Object(extra)) = (payload.as_object_mut(), detail) {
            obj.extend(extra);
        }

        self.commit(&mut w, map, vec![(action.to_string(), payload)])?;
        drop(w);

        let updated = self
            .get_policy(name)
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_string()))?;
        info!(policy = name, action, "policy updated");

        let ts_utc = Utc::now();
        let ev = match action {
            "lock" => ControlEvent::PolicyLocked {
                policy: name.to_string(),
                ts_utc,
            },
            "unlock" => ControlEvent::PolicyUnlocked {
                policy: name.to_string(),
                ts_utc,
            },
            _ => ControlEvent::PolicyUpdated {
                policy: name.to_string(),
                action: action.to_string(),
                ts_utc,
            },
        };
        self.publish(ev);
        Ok(updated)
    }

    /// Persist, audit, swap. On an audit failure the previous state file is
    /// restored and the snapshot is left untouched.
    fn commit(
        &self,
        w: &mut Writer,
        next: BTreeMap<String, PersistedPolicy>,
        records: Vec<(String, Value)>,
    ) -> Result<(), PolicyError> {
        let previous = PolicyState {
            version: STATE_VERSION,
            policies: self
                .snapshot
                .read()
                .iter()
                .map(|(k, p)| {
                    (
                        k.clone(),
                        PersistedPolicy {
                            policy: (**p).clone(),
                            seed_hash: w.seeds.get(k).cloned().unwrap_or_default(),
                        },
                    )
                })
                .collect(),
        };
        let state = PolicyState {
            version: STATE_VERSION,
            policies: next,
        };
        write_state_atomic(&w.state_path, &state).map_err(PolicyError::Persist)?;

        for (event_type, payload) in records {
            if let Err(e) = w.audit.append(AUDIT_TOPIC, &event_type, payload) {
                if let Err(restore) = write_state_atomic(&w.state_path, &previous) {
                    warn!(error = %restore, "failed to restore policy state after audit failure");
                }
                return Err(PolicyError::Persist(e));
            }
        }

        w.seeds = state
            .policies
            .iter()
            .map(|(k, p)| (k.clone(), p.seed_hash.clone()))
            .collect();
        *self.snapshot.write() = Arc::new(to_map(&state.policies));
        Ok(())
    }

    fn publish(&self, ev: ControlEvent) {
        if let Some(bus) = &self.events {
            bus.publish(ev);
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

struct ReconcilePlan {
    next: BTreeMap<String, PersistedPolicy>,
    summary: ReloadSummary,
}

/// Merge document policies over the current ones.
///
/// - locked current policy: the document must carry identical parameters,
///   the current state (still locked) is kept;
/// - unlocked current policy whose document entry is unchanged since it was
///   seeded: kept, so runtime edits survive restarts;
/// - otherwise the document entry wins.
fn reconcile(
    document: &BTreeMap<String, RiskPolicy>,
    current: &BTreeMap<String, PersistedPolicy>,
) -> Result<ReconcilePlan, PolicyError> {
    let mut next = BTreeMap::new();
    let mut summary = ReloadSummary::default();

    for (name, cur) in current {
        if cur.policy.locked && !document.contains_key(name) {
            return Err(PolicyError::LockedPolicyMismatch {
                policy: name.clone(),
                detail: "removed from the control document".to_string(),
            });
        }
        if !document.contains_key(name) {
            summary.removed.push(name.clone());
        }
    }

    for (name, doc_policy) in document {
        let seed_hash = seed_hash(doc_policy)?;
        let entry = match current.get(name) {
            None => {
                summary.changed.push(name.clone());
                PersistedPolicy {
                    policy: doc_policy.clone(),
                    seed_hash,
                }
            }
            Some(cur) if cur.policy.locked => {
                if !cur.policy.same_parameters(doc_policy) {
                    return Err(PolicyError::LockedPolicyMismatch {
                        policy: name.clone(),
                        detail: describe_difference(&cur.policy, doc_policy),
                    });
                }
                if cur.seed_hash != seed_hash {
                    summary.changed.push(name.clone());
                }
                PersistedPolicy {
                    policy: cur.policy.clone(),
                    seed_hash,
                }
            }
            Some(cur) if cur.seed_hash == seed_hash => cur.clone(),
            Some(_) => {
                summary.changed.push(name.clone());
                PersistedPolicy {
                    policy: doc_policy.clone(),
                    seed_hash,
                }
            }
        };
        next.insert(name.clone(), entry);
    }

    Ok(ReconcilePlan { next, summary })
}

fn seed_hash(policy: &RiskPolicy) -> Result<String, PolicyError> {
    let v = serde_json::to_value(policy).map_err(|e| PolicyError::Persist(e.into()))?;
    let canonical = rcl_config::canonicalize_json(&v).map_err(PolicyError::Persist)?;
    Ok(rcl_config::sha256_hex(canonical.as_bytes()))
}

fn describe_difference(locked: &RiskPolicy, doc: &RiskPolicy) -> String {
    let mut parts = Vec::new();
    if locked.risk != doc.risk {
        parts.push("risk");
    }
    if locked.limits != doc.limits {
        parts.push("limits");
    }
    if locked.protection != doc.protection {
        parts.push("protection");
    }
    format!("section(s) {} changed", parts.join(", "))
}

fn flag_change(field: &str, old_value: bool, new_value: bool) -> Value {
    json!({"field": field, "old_value": old_value, "new_value": new_value})
}

/// One record per changed or removed policy. `old_value` is null for a
/// policy seen for the first time, `new_value` is null for a removal.
fn reseed_records(
    summary: &ReloadSummary,
    current: &BTreeMap<String, PersistedPolicy>,
    next: &BTreeMap<String, PersistedPolicy>,
    source: &str,
) -> Vec<(String, Value)> {
    let ts_utc = Utc::now();
    let record = |action: &str, p: &String| {
        (
            action.to_string(),
            json!({
                "policy": p,
                "action": action,
                "source": source,
                "old_value": current.get(p).map(|c| &c.policy),
                "new_value": next.get(p).map(|n| &n.policy),
                "ts_utc": ts_utc,
            }),
        )
    };
    let changed = summary.changed.iter().map(|p| record("reseed", p));
    let removed = summary.removed.iter().map(|p| record("remove", p));
    changed.chain(removed).collect()
}

fn to_map(policies: &BTreeMap<String, PersistedPolicy>) -> PolicyMap {
    policies
        .iter()
        .map(|(k, p)| (k.clone(), Arc::new(p.policy.clone())))
        .collect()
}

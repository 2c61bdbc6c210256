//! Shared runtime state for rcl-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The account loops run
//! in the [`rcl_runtime::Fleet`] held by `main`; the state only keeps the
//! candidate queues feeding them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rcl_config::AccountConfig;
use rcl_ledger::PerformanceLedger;
use rcl_policy::RiskPolicyStore;
use rcl_schemas::{ControlEvent, EventBus, TradeCandidate};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages surfaced as SSE events on `/v1/stream`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    Control(ControlEvent),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountStatus {
    pub account_id: String,
    pub strategy: String,
    pub instrument: String,
    pub mandate: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyStatus {
    pub name: String,
    pub enabled: bool,
    pub locked: bool,
}

/// Returned by GET /v1/status and carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    pub accounts: Vec<AccountStatus>,
    pub policies: Vec<PolicyStatus>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Config of one running account plus the queue into its loop.
#[derive(Clone)]
pub struct AccountHandle {
    pub config: AccountConfig,
    pub candidates: mpsc::Sender<TradeCandidate>,
}

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub policies: Arc<RiskPolicyStore>,
    pub ledger: PerformanceLedger,
    pub accounts: BTreeMap<String, AccountHandle>,
    /// Hash of the control document last applied (startup or reload).
    pub config_hash: Arc<RwLock<String>>,
}

impl AppState {
    pub fn new(
        policies: Arc<RiskPolicyStore>,
        ledger: PerformanceLedger,
        accounts: BTreeMap<String, AccountHandle>,
        config_hash: String,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "rcl-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            policies,
            ledger,
            accounts,
            config_hash: Arc::new(RwLock::new(config_hash)),
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let accounts = self
            .accounts
            .values()
            .map(|h| AccountStatus {
                account_id: h.config.account_id.clone(),
                strategy: h.config.strategy.clone(),
                instrument: h.config.instrument.clone(),
                mandate: h.config.mandate.is_some(),
            })
            .collect();
        let policies = self
            .policies
            .policies()
            .iter()
            .map(|(name, p)| PolicyStatus {
                name: name.clone(),
                enabled: p.enabled,
                locked: p.locked,
            })
            .collect();
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            config_hash: self.config_hash.read().await.clone(),
            accounts,
            policies,
        }
    }

    pub fn log(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Relay every [`ControlEvent`] onto the SSE bus until the event bus closes.
pub fn spawn_event_forwarder(events: &EventBus, bus: broadcast::Sender<BusMsg>) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let _ = bus.send(BusMsg::Control(ev));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event forwarder lagged");
                    let _ = bus.send(BusMsg::LogLine {
                        level: "WARN".to_string(),
                        msg: format!("{missed} control events dropped from stream"),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

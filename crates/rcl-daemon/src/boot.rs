//! Startup wiring: control document in, running fleet and shared state out.
//!
//! Everything is constructed here and injected; nothing below reaches for
//! globals. Any failure aborts startup, in particular a locked policy whose
//! persisted values disagree with the document.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use rcl_audit::AuditLog;
use rcl_broker_paper::PaperBroker;
use rcl_config::{ControlDocument, LoadedConfig};
use rcl_execution::{BrokerGateway, GatewaySettings};
use rcl_ledger::PerformanceLedger;
use rcl_policy::RiskPolicyStore;
use rcl_quality::QualityScorer;
use rcl_runtime::{AccountLoop, ChannelSignalSource, Fleet, LoopContext};
use rcl_schemas::EventBus;
use tracing::info;

use crate::state::{spawn_event_forwarder, AccountHandle, AppState};

/// Queued candidates per account before the API answers 503.
pub const CANDIDATE_QUEUE: usize = 32;

pub struct Daemon {
    pub state: Arc<AppState>,
    pub fleet: Fleet,
    pub events: EventBus,
}

pub async fn boot(loaded: &LoadedConfig, doc: &ControlDocument) -> anyhow::Result<Daemon> {
    let events = EventBus::new(doc.daemon.event_capacity);

    let audit = AuditLog::open(&doc.audit.path, doc.audit.hash_chain)
        .with_context(|| format!("failed to open policy audit log {}", doc.audit.path))?;
    let policies = Arc::new(
        RiskPolicyStore::open(doc, &doc.daemon.policy_state_path, audit, Some(events.clone()))
            .context("risk policy store refused to start")?,
    );

    let ledger = PerformanceLedger::connect(&doc.ledger)
        .await
        .with_context(|| format!("failed to open ledger {}", doc.ledger.url))?;

    let broker = Arc::new(PaperBroker::from_config(&doc.broker.paper, &doc.accounts));
    let gateway = BrokerGateway::new(broker, GatewaySettings::from(&doc.broker));

    let ctx = LoopContext {
        ledger: ledger.clone(),
        policies: policies.clone(),
        gateway,
        scorer: Arc::new(QualityScorer::new(doc.quality.clone())),
        events: events.clone(),
    };

    let mut fleet = Fleet::new();
    let mut accounts = BTreeMap::new();
    for account in &doc.accounts {
        if !account.enabled {
            info!(account_id = %account.account_id, "account disabled in config; not started");
            continue;
        }
        let (tx, source) = ChannelSignalSource::new(CANDIDATE_QUEUE);
        let account_loop = AccountLoop::new(account.clone(), ctx.clone(), source)
            .with_context(|| format!("account {} cannot start", account.account_id))?;
        fleet.spawn(account_loop);
        accounts.insert(
            account.account_id.clone(),
            AccountHandle {
                config: account.clone(),
                candidates: tx,
            },
        );
    }

    let state = Arc::new(AppState::new(
        policies,
        ledger,
        accounts,
        loaded.config_hash.clone(),
    ));
    spawn_event_forwarder(&events, state.bus.clone());

    info!(
        config_hash = %loaded.config_hash,
        accounts = fleet.len(),
        policies = state.policies.policies().len(),
        "control layer started"
    );
    Ok(Daemon { state, fleet, events })
}

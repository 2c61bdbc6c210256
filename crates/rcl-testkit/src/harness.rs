use std::sync::Arc;

use anyhow::{Context, Result};
use rcl_audit::AuditLog;
use rcl_broker_paper::PaperBroker;
use rcl_config::{load_layered_yaml_from_strings, AccountConfig, ControlDocument};
use rcl_execution::{BrokerGateway, GatewaySettings};
use rcl_ledger::PerformanceLedger;
use rcl_policy::RiskPolicyStore;
use rcl_quality::QualityScorer;
use rcl_runtime::{AccountLoop, LoopContext, SignalSource};
use rcl_schemas::{ControlEvent, EventBus};
use tokio::sync::broadcast;

pub struct ControlHarness {
    dir: tempfile::TempDir,
    pub doc: ControlDocument,
    pub broker: Arc<PaperBroker>,
    pub ledger: PerformanceLedger,
    pub policies: Arc<RiskPolicyStore>,
    pub events: EventBus,
    pub ctx: LoopContext,
}

impl ControlHarness {
    /// Gateway settings come from the document's `broker` section; quotes
    /// and balances seed the paper broker.
    pub async fn from_yaml(yaml: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create harness temp dir")?;
        let doc = load_layered_yaml_from_strings(&[yaml])?
            .document()
            .context("harness control document rejected")?;

        let events = EventBus::new(doc.daemon.event_capacity);
        let audit = AuditLog::open(dir.path().join("audit.jsonl"), true)?;
        let policies = Arc::new(RiskPolicyStore::open(
            &doc,
            dir.path().join("policy_state.json"),
            audit,
            Some(events.clone()),
        )?);
        let ledger = PerformanceLedger::in_memory().await?;
        let broker = Arc::new(PaperBroker::from_config(&doc.broker.paper, &doc.accounts));
        let gateway = BrokerGateway::new(broker.clone(), GatewaySettings::from(&doc.broker));

        let ctx = LoopContext {
            ledger: ledger.clone(),
            policies: policies.clone(),
            gateway,
            scorer: Arc::new(QualityScorer::new(doc.quality.clone())),
            events: events.clone(),
        };
        Ok(Self {
            dir,
            doc,
            broker,
            ledger,
            policies,
            events,
            ctx,
        })
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn account(&self, account_id: &str) -> Result<AccountConfig> {
        self.doc
            .account(account_id)
            .cloned()
            .with_context(|| format!("no account {account_id} in harness document"))
    }

    /// A loop for `account_id`, restored from the ledger, ready to `tick`.
    pub async fn account_loop<S: SignalSource>(&self, account_id: &str, signals: S) -> Result<AccountLoop<S>> {
        let mut lp = AccountLoop::new(self.account(account_id)?, self.ctx.clone(), signals)?;
        lp.restore().await?;
        Ok(lp)
    }

    /// A loop that has not been restored; `run` restores it itself.
    pub fn unstarted_loop<S: SignalSource>(&self, account_id: &str, signals: S) -> Result<AccountLoop<S>> {
        Ok(AccountLoop::new(self.account(account_id)?, self.ctx.clone(), signals)?)
    }
}

/// Everything published since the last drain.
pub fn drain_events(rx: &mut broadcast::Receiver<ControlEvent>) -> Vec<ControlEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => out.push(ev),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}

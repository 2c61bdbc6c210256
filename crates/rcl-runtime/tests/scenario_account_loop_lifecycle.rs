//! Account loop lifecycle against the paper broker
//!
//! Validates: one account loop takes a candidate through quality, policy and
//! risk checks, opens it once, moves its stop to break-even only after the
//! broker accepts the change, and records the exit when the broker closes
//! the trade.
//!
//! GREEN when:
//! - An approved candidate produces exactly one order and one OPEN ledger row.
//! - The break-even stop lands on the broker, in the ledger history and in
//!   the protection registry in the same tick.
//! - A stop modification the broker fails leaves the old stop in place and is
//!   re-proposed on the next tick.
//! - A broker-side stop-out is folded into the ledger and unregistered.
//! - Low-quality and disabled-policy candidates never reach the broker.
//! - Fleet shutdown joins every loop.

use chrono::{TimeZone, Utc};
use rcl_audit::AuditLog;
use rcl_broker_paper::PaperBroker;
use rcl_config::{load_layered_yaml_from_strings, ControlDocument};
use rcl_execution::{BrokerGateway, GatewaySettings};
use rcl_ledger::PerformanceLedger;
use rcl_policy::RiskPolicyStore;
use rcl_quality::QualityScorer;
use rcl_runtime::{AccountLoop, CandidateOutcome, ChannelSignalSource, DenialReason, Fleet, LoopContext};
use rcl_schemas::{ControlEvent, Direction, EventBus, IndicatorSnapshot, ProtectionStage, TradeCandidate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DOC: &str = r#"
version: 1
policies:
  momentum:
    risk: { max_risk_per_trade: 0.01, min_risk_reward: 1.5 }
    limits: { max_concurrent_positions: 3, max_trades_per_day: 10 }
    protection: { breakeven_threshold: 0.005, trail_activation: 0.01, trail_distance: 0.008 }
accounts:
  - account_id: acct-1
    strategy: momentum
    instrument: EUR_USD
    instrument_class: forex
    initial_balance: 100000
    poll_interval_ms: 10
quality:
  min_passing_checks: 5
  sessions: []
  instruments:
    EUR_USD: { min_volatility: 0.0004, max_spread: 0.0002 }
"#;

struct Harness {
    _dir: tempfile::TempDir,
    broker: Arc<PaperBroker>,
    ledger: PerformanceLedger,
    policies: Arc<RiskPolicyStore>,
    bus: EventBus,
    ctx: LoopContext,
    doc: ControlDocument,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let doc = load_layered_yaml_from_strings(&[DOC]).unwrap().document().unwrap();
    let bus = EventBus::new(256);
    let audit = AuditLog::open(dir.path().join("audit.jsonl"), true).unwrap();
    let policies = Arc::new(
        RiskPolicyStore::open(&doc, dir.path().join("state.json"), audit, Some(bus.clone())).unwrap(),
    );
    let ledger = PerformanceLedger::in_memory().await.unwrap();

    let broker = Arc::new(PaperBroker::new());
    broker.open_account("acct-1", 100_000.0);
    broker.set_quote("EUR_USD", 1.1000, 1.1001);

    let gateway = BrokerGateway::new(
        broker.clone(),
        GatewaySettings {
            timeout: Duration::from_secs(1),
            read_retries: 0,
            retry_base_delay: Duration::from_millis(1),
        },
    );
    let ctx = LoopContext {
        ledger: ledger.clone(),
        policies: policies.clone(),
        gateway,
        scorer: Arc::new(QualityScorer::new(doc.quality.clone())),
        events: bus.clone(),
    };
    Harness {
        _dir: dir,
        broker,
        ledger,
        policies,
        bus,
        ctx,
        doc,
    }
}

impl Harness {
    async fn account_loop(&self) -> (mpsc::Sender<TradeCandidate>, AccountLoop<ChannelSignalSource>) {
        let (tx, source) = ChannelSignalSource::new(8);
        let mut lp = AccountLoop::new(self.doc.accounts[0].clone(), self.ctx.clone(), source).unwrap();
        lp.restore().await.unwrap();
        (tx, lp)
    }
}

fn long_candidate() -> TradeCandidate {
    TradeCandidate {
        account_id: "acct-1".to_string(),
        strategy: "momentum".to_string(),
        instrument: "EUR_USD".to_string(),
        direction: Direction::Long,
        entry_price: 1.1000,
        stop_loss: Some(1.0950),
        take_profit: Some(1.1100),
        indicators: IndicatorSnapshot {
            momentum: 0.001,
            trend_strength: 30.0,
            volatility: 0.001,
            spread: 0.0001,
            fast_avg: 1.0998,
            mid_avg: 1.0990,
            slow_avg: 1.0980,
        },
        rationale: "fast average crossed above mid".to_string(),
        generated_at: Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap(),
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ControlEvent>) -> Vec<ControlEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[tokio::test]
async fn approved_candidate_is_opened_protected_and_closed() {
    let h = harness().await;
    let mut events = h.bus.subscribe();
    let (tx, mut lp) = h.account_loop().await;

    tx.send(long_candidate()).await.unwrap();
    let report = lp.tick().await;
    let Some(CandidateOutcome::Opened { trade_id, units, fill_price }) = report.candidate else {
        panic!("expected an opened trade, got {:?}", report.candidate);
    };
    assert_eq!(fill_price, 1.1001);
    assert!(units >= 1_000);
    assert_eq!(h.broker.order_submissions(), 1);
    assert_eq!(lp.protection().len(), 1);

    let open = h.ledger.open_trades("acct-1").await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].trade_id, trade_id);
    assert_eq!(open[0].units, units);

    let kinds = drain(&mut events);
    assert!(matches!(kinds[0], ControlEvent::TradeApproved { .. }), "{kinds:?}");
    assert!(matches!(kinds[1], ControlEvent::PositionOpened { .. }), "{kinds:?}");

    // +0.63% on the bid: break-even, not yet trailing.
    h.broker.set_quote("EUR_USD", 1.1070, 1.1071);
    let report = lp.tick().await;
    assert_eq!(report.stops_moved.len(), 1);
    assert_eq!(report.stops_moved[0].new_stop, 1.1001);
    assert_eq!(h.broker.stop_of(&trade_id), Some(1.1001));
    let position = lp.protection().get(&trade_id).unwrap();
    assert_eq!(position.stage(), ProtectionStage::Breakeven);
    assert_eq!(position.current_stop(), 1.1001);

    let history = h.ledger.stop_history(&trade_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_stop, 1.0950);

    let kinds = drain(&mut events);
    assert!(kinds.iter().any(|e| matches!(e, ControlEvent::StopAdjusted { .. })));
    assert!(kinds.iter().any(|e| matches!(
        e,
        ControlEvent::ProtectionStageChanged { to: ProtectionStage::Breakeven, .. }
    )));

    // Same quote again: nothing to do.
    let report = lp.tick().await;
    assert!(report.stops_moved.is_empty());

    // Bid falls through the break-even stop; the broker settles the trade.
    h.broker.set_quote("EUR_USD", 1.0990, 1.0991);
    let report = lp.tick().await;
    assert_eq!(report.closed, vec![trade_id.clone()]);
    assert!(lp.protection().is_empty());

    let state = h.ledger.get_account_state("acct-1").await.unwrap().unwrap();
    assert_eq!(state.total_trades, 1);
    assert!(h.ledger.open_trades("acct-1").await.unwrap().is_empty());
    let closed = h.ledger.trade(&trade_id).await.unwrap().unwrap();
    assert_eq!(closed.exit_price, Some(1.1001));

    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, ControlEvent::PositionClosed { .. })));
}

#[tokio::test]
async fn failed_stop_modification_is_retried_next_tick() {
    let h = harness().await;
    let (tx, mut lp) = h.account_loop().await;

    tx.send(long_candidate()).await.unwrap();
    let Some(CandidateOutcome::Opened { trade_id, .. }) = lp.tick().await.candidate else {
        panic!("expected an opened trade");
    };

    h.broker.set_quote("EUR_USD", 1.1070, 1.1071);
    h.broker.fail_next_stop_modifications(1);
    let report = lp.tick().await;
    assert!(report.stops_moved.is_empty());
    assert_eq!(h.broker.stop_of(&trade_id), Some(1.0950));
    let position = lp.protection().get(&trade_id).unwrap();
    assert_eq!(position.current_stop(), 1.0950);
    assert_eq!(position.stage(), ProtectionStage::Initial);
    assert!(h.ledger.stop_history(&trade_id).await.unwrap().is_empty());

    let report = lp.tick().await;
    assert_eq!(report.stops_moved.len(), 1);
    assert_eq!(h.broker.stop_of(&trade_id), Some(1.1001));
    assert_eq!(h.ledger.stop_history(&trade_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn low_quality_candidate_never_reaches_the_broker() {
    let h = harness().await;
    let mut events = h.bus.subscribe();
    let (tx, mut lp) = h.account_loop().await;

    let mut c = long_candidate();
    c.indicators.momentum = 0.0;
    c.indicators.trend_strength = 5.0;
    c.indicators.fast_avg = 1.0970;
    tx.send(c).await.unwrap();

    let report = lp.tick().await;
    match report.candidate {
        Some(CandidateOutcome::Denied(DenialReason::Quality { passed, required, .. })) => {
            assert!(passed < required);
            assert_eq!(required, 5);
        }
        other => panic!("expected a quality denial, got {other:?}"),
    }
    assert_eq!(h.broker.order_submissions(), 0);
    assert!(h.ledger.open_trades("acct-1").await.unwrap().is_empty());

    let evs = drain(&mut events);
    assert!(evs.iter().any(|e| matches!(
        e,
        ControlEvent::TradeDenied { reason, .. } if reason.starts_with("Signal quality too low")
    )));
}

#[tokio::test]
async fn disabled_policy_blocks_new_trades_but_keeps_protecting() {
    let h = harness().await;
    let (tx, mut lp) = h.account_loop().await;

    tx.send(long_candidate()).await.unwrap();
    let Some(CandidateOutcome::Opened { trade_id, .. }) = lp.tick().await.candidate else {
        panic!("expected an opened trade");
    };

    h.policies.disable("momentum").unwrap();
    let mut second = long_candidate();
    second.rationale = "second entry".to_string();
    tx.send(second).await.unwrap();
    h.broker.set_quote("EUR_USD", 1.1070, 1.1071);

    let report = lp.tick().await;
    assert!(matches!(
        report.candidate,
        Some(CandidateOutcome::Denied(DenialReason::PolicyDisabled(ref p))) if p == "momentum"
    ));
    assert_eq!(h.broker.order_submissions(), 1);
    assert_eq!(report.stops_moved.len(), 1);
    assert_eq!(h.broker.stop_of(&trade_id), Some(1.1001));
}

#[tokio::test]
async fn restart_restores_open_positions_with_their_stage() {
    let h = harness().await;
    let (tx, mut lp) = h.account_loop().await;

    tx.send(long_candidate()).await.unwrap();
    let Some(CandidateOutcome::Opened { trade_id, .. }) = lp.tick().await.candidate else {
        panic!("expected an opened trade");
    };
    h.broker.set_quote("EUR_USD", 1.1070, 1.1071);
    lp.tick().await;
    drop(lp);

    let (_tx, restarted) = h.account_loop().await;
    let position = restarted.protection().get(&trade_id).unwrap();
    assert_eq!(position.stage(), ProtectionStage::Breakeven);
    assert_eq!(position.current_stop(), 1.1001);
    assert_eq!(position.peak_price(), 1.1070);
}

#[tokio::test]
async fn fleet_shutdown_joins_running_loops() {
    let h = harness().await;
    let (_tx, lp) = h.account_loop().await;

    let mut fleet = Fleet::new();
    fleet.spawn(lp);
    assert_eq!(fleet.len(), 1);
    assert_eq!(fleet.account_ids().collect::<Vec<_>>(), vec!["acct-1"]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(2), fleet.shutdown())
        .await
        .expect("loops did not stop");
}

//! Mandate-restricted account
//!
//! Validates: a mandate account only opens trades its mandate allows. The
//! mandate judges the size the risk gate would actually order.
//!
//! GREEN when:
//! - A short candidate on a long-only mandate is denied `WrongDirection`.
//! - A stop outside the mandate's pip band is denied.
//! - With the policy's risk raised so the sized order exceeds `max_units`,
//!   the candidate is denied `UnitsOverCap` rather than silently shrunk.
//! - At the original risk, a conforming candidate opens at most `max_units`.

use rcl_risk::MandateRejection;
use rcl_runtime::{CandidateOutcome, DenialReason};
use rcl_schemas::Direction;
use serde_json::json;
use rcl_testkit::{long_candidate, ControlHarness, ScriptedSignals};

const DOC: &str = r#"
version: 1
policies:
  gold_long:
    risk: { max_risk_per_trade: 0.0005, min_risk_reward: 1.5 }
    limits: { max_concurrent_positions: 2, max_trades_per_day: 4 }
    protection: { breakeven_threshold: 0.005, trail_activation: 0.01, trail_distance: 0.008 }
accounts:
  - account_id: mandate-1
    strategy: gold_long
    instrument: EUR_USD
    instrument_class: forex
    initial_balance: 100000
    mandate:
      instrument: EUR_USD
      direction: LONG
      max_units: 10000
      max_concurrent_positions: 1
      max_total_units: 10000
      entry_zones: [{ low: 1.0900, high: 1.1100 }]
      stop_distance_pips: { min: 20, max: 80 }
      min_take_profit_pips: 60
      min_risk_reward: 1.5
quality:
  min_passing_checks: 5
  sessions: []
  instruments:
    EUR_USD: { min_volatility: 0.0004, max_spread: 0.0002 }
broker:
  timeout_ms: 1000
  read_retries: 0
  paper:
    quotes:
      EUR_USD: { bid: 1.1000, ask: 1.1001 }
"#;

#[tokio::test]
async fn mandate_rules_gate_entries_and_size() {
    let h = ControlHarness::from_yaml(DOC).await.unwrap();
    let (script, signals) = ScriptedSignals::new([]);
    let mut lp = h.account_loop("mandate-1", signals).await.unwrap();

    let mut short = long_candidate("mandate-1", "gold_long", "EUR_USD", 1.1000, 1.1050, 1.0900);
    short.direction = Direction::Short;
    short.indicators.momentum = -0.001;
    short.indicators.fast_avg = 1.0980;
    short.indicators.slow_avg = 1.0998;
    script.push(short);
    let report = lp.tick().await;
    assert!(matches!(
        report.candidate,
        Some(CandidateOutcome::Denied(DenialReason::Mandate(MandateRejection::WrongDirection { .. })))
    ), "{:?}", report.candidate);

    // 150 pip stop; band is 20..80.
    script.push(long_candidate("mandate-1", "gold_long", "EUR_USD", 1.1000, 1.0850, 1.1300));
    let report = lp.tick().await;
    assert!(matches!(
        report.candidate,
        Some(CandidateOutcome::Denied(DenialReason::Mandate(MandateRejection::StopDistanceOutOfBand { .. })))
    ), "{:?}", report.candidate);
    assert_eq!(h.broker.order_submissions(), 0);

    // 1% risk over 50 pips sizes to about 200k units; cap is 10k.
    h.policies
        .update_parameter("gold_long", "risk", "max_risk_per_trade", json!(0.01))
        .unwrap();
    script.push(long_candidate("mandate-1", "gold_long", "EUR_USD", 1.1000, 1.0950, 1.1100));
    let report = lp.tick().await;
    match report.candidate {
        Some(CandidateOutcome::Denied(DenialReason::Mandate(MandateRejection::UnitsOverCap { units, max }))) => {
            assert!(units >= 199_000, "{units}");
            assert_eq!(max, 10_000);
        }
        other => panic!("expected UnitsOverCap, got {other:?}"),
    }
    assert_eq!(h.broker.order_submissions(), 0);

    // 0.05% risk over 50 pips sizes to about 10k units.
    h.policies
        .update_parameter("gold_long", "risk", "max_risk_per_trade", json!(0.0005))
        .unwrap();
    let mut conforming = long_candidate("mandate-1", "gold_long", "EUR_USD", 1.1000, 1.0950, 1.1100);
    conforming.rationale = "pullback into zone".to_string();
    script.push(conforming);
    let report = lp.tick().await;
    let Some(CandidateOutcome::Opened { units, .. }) = report.candidate else {
        panic!("expected an opened trade, got {:?}", report.candidate);
    };
    assert!(units <= 10_000, "{units}");
    assert_eq!(h.broker.order_submissions(), 1);
}

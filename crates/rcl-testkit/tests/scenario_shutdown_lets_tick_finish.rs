//! Cooperative shutdown
//!
//! Validates: a shutdown signal raised while a tick is in flight lets that
//! tick finish, so an order already sent is recorded before the loop exits.
//!
//! GREEN when:
//! - Shutdown is raised after `TradeApproved` and before the fill is known.
//! - The fleet joins, and the ledger holds the opened trade.

use std::time::Duration;

use rcl_runtime::Fleet;
use rcl_schemas::ControlEvent;
use rcl_testkit::{long_candidate, ControlHarness, ScriptedSignals};

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
    poll_interval_ms: 20
quality:
  min_passing_checks: 5
  sessions: []
  instruments:
    EUR_USD: { min_volatility: 0.0004, max_spread: 0.0002 }
broker:
  timeout_ms: 2000
  read_retries: 0
  paper:
    quotes:
      EUR_USD: { bid: 1.1000, ask: 1.1001 }
"#;

#[tokio::test]
async fn shutdown_mid_tick_still_records_the_fill() {
    let h = ControlHarness::from_yaml(DOC).await.unwrap();
    let mut events = h.events.subscribe();
    let first = long_candidate("acct-1", "momentum", "EUR_USD", 1.1000, 1.0950, 1.1100);
    let (_script, signals) = ScriptedSignals::new([first]);
    let lp = h.unstarted_loop("acct-1", signals).unwrap();

    // Slow reads keep the fill verification in flight after approval.
    h.broker.set_read_delay(Some(Duration::from_millis(150)));
    let mut fleet = Fleet::new();
    fleet.spawn(lp);

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(ControlEvent::TradeApproved { .. }) => break,
                Ok(_) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .expect("candidate was never approved");

    tokio::time::timeout(Duration::from_secs(5), fleet.shutdown())
        .await
        .expect("loop did not stop");

    assert_eq!(h.broker.order_submissions(), 1);
    let open = h.ledger.open_trades("acct-1").await.unwrap();
    assert_eq!(open.len(), 1);
}

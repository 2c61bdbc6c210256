//! Scenario: exit without a committed entry.
//!
//! Validates:
//! - recording an exit for a trade that was never entered fails with
//!   `ExitWithoutEntry`;
//! - the failed exit leaves account state, trades and daily summaries untouched;
//! - a second exit for an already closed trade fails the same way.
//!
//! GREEN when: the ledger after the failed calls equals the ledger before them.

use chrono::{TimeZone, Utc};
use rcl_ledger::{LedgerError, PerformanceLedger, TradeEntry, TradeExit};
use rcl_schemas::Direction;

fn exit(trade_id: &str, pnl: f64) -> TradeExit {
    TradeExit {
        trade_id: trade_id.to_string(),
        account_id: "acct".to_string(),
        exit_price: 1.1050,
        realized_pl: pnl,
        closed_at: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn exit_without_entry_is_rejected_and_writes_nothing() -> anyhow::Result<()> {
    let ledger = PerformanceLedger::in_memory().await?;
    let before = ledger.open_account("acct", 100_000.0).await?;

    let err = ledger.record_trade_exit(&exit("ghost", 500.0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ExitWithoutEntry { ref trade_id } if trade_id == "ghost"));

    assert_eq!(ledger.get_account_state("acct").await?, Some(before));
    assert!(ledger.trade("ghost").await?.is_none());
    assert!(ledger.get_daily_summary("acct", 30).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn double_exit_is_rejected() -> anyhow::Result<()> {
    let ledger = PerformanceLedger::in_memory().await?;
    ledger.open_account("acct", 100_000.0).await?;
    ledger
        .record_trade_entry(&TradeEntry {
            trade_id: "T-1".to_string(),
            account_id: "acct".to_string(),
            strategy: "momentum".to_string(),
            instrument: "EUR_USD".to_string(),
            direction: Direction::Long,
            units: 20_000,
            client_order_id: "c-1".to_string(),
            quality_score: 85,
            entry_price: 1.1000,
            stop_loss: 1.0950,
            take_profit: Some(1.1100),
            entered_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        })
        .await?;

    let after_first = ledger.record_trade_exit(&exit("T-1", 100.0)).await?;
    assert_eq!(after_first.current_balance, 100_100.0);

    let err = ledger.record_trade_exit(&exit("T-1", 100.0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ExitWithoutEntry { .. }));
    assert_eq!(ledger.get_account_state("acct").await?, Some(after_first));

    let days = ledger.get_daily_summary("acct", 7).await?;
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].wins, 1);
    assert_eq!(days[0].realized_pl, 100.0);
    Ok(())
}

#[tokio::test]
async fn exit_on_wrong_account_is_rejected() -> anyhow::Result<()> {
    let ledger = PerformanceLedger::in_memory().await?;
    ledger.open_account("acct", 100_000.0).await?;
    ledger.open_account("other", 50_000.0).await?;
    ledger
        .record_trade_entry(&TradeEntry {
            trade_id: "T-9".to_string(),
            account_id: "other".to_string(),
            strategy: "gold_long".to_string(),
            instrument: "XAU_USD".to_string(),
            direction: Direction::Long,
            units: 5,
            client_order_id: "c-9".to_string(),
            quality_score: 70,
            entry_price: 2310.0,
            stop_loss: 2300.0,
            take_profit: Some(2330.0),
            entered_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        })
        .await?;

    // exit() targets "acct"; the trade belongs to "other"
    let err = ledger.record_trade_exit(&exit("T-9", -50.0)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ExitWithoutEntry { .. }));
    assert_eq!(ledger.open_trades("other").await?.len(), 1);
    Ok(())
}

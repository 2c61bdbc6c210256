use anyhow::{Context, Result};
use rcl_ledger::PerformanceLedger;

use super::{ledger_url, print_json};

async fn open(flag: Option<String>) -> Result<PerformanceLedger> {
    let url = ledger_url(flag)?;
    tracing::debug!(%url, "opening ledger");
    PerformanceLedger::connect_url(&url, 1)
        .await
        .with_context(|| format!("failed to open ledger {url}"))
}

pub async fn ledger_summary(flag: Option<String>, account: &str, days: u32) -> Result<()> {
    let ledger = open(flag).await?;
    let Some(state) = ledger.get_account_state(account).await? else {
        println!("account={account} state=none");
        return Ok(());
    };
    let daily = ledger.get_daily_summary(account, days).await?;

    println!(
        "account={} balance={:.2} peak={:.2} trades={} wins={} losses={}",
        account, state.current_balance, state.peak_balance, state.total_trades, state.wins, state.losses
    );
    println!(
        "total_drawdown={:.4} daily_drawdown={:.4} trading_days={}",
        state.total_drawdown(),
        state.daily_drawdown(),
        state.trading_days
    );
    print_json(&serde_json::to_value(&daily).context("serialize daily summary")?)
}

pub async fn ledger_snapshot(flag: Option<String>, account: &str) -> Result<()> {
    let ledger = open(flag).await?;
    match ledger.get_latest_snapshot(account).await? {
        Some(snap) => print_json(&serde_json::to_value(&snap).context("serialize snapshot")?),
        None => {
            println!("account={account} snapshot=none");
            Ok(())
        }
    }
}

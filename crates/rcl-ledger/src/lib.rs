//! rcl-ledger
//!
//! PerformanceLedger: the single durable source of account state.
//!
//! Every trade event is one SQL transaction that writes the trade row, the
//! folded [`AccountState`] and the day's rollup together. Writers for the
//! same account are serialized by [`AccountLocks`], so two exits racing on
//! one account can never fold into the same starting state.

mod error;
mod locks;

pub use error::LedgerError;
pub use locks::AccountLocks;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rcl_config::LedgerConfig;
use rcl_risk::AccountState;
use rcl_schemas::{Direction, Position, ProtectionStage};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

pub type Result<T> = std::result::Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A confirmed, re-verified fill.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub trade_id: String,
    pub account_id: String,
    pub strategy: String,
    pub instrument: String,
    pub direction: Direction,
    pub units: u64,
    pub client_order_id: String,
    pub quality_score: u8,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub entered_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub trade_id: String,
    pub account_id: String,
    pub exit_price: f64,
    pub realized_pl: f64,
    pub closed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopAdjustment {
    pub trade_id: String,
    pub previous_stop: f64,
    pub new_stop: f64,
    pub stage: ProtectionStage,
    pub peak_price: f64,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
        }
    }
}

/// A trade row as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    pub account_id: String,
    pub strategy: String,
    pub instrument: String,
    pub direction: Direction,
    pub units: u64,
    pub client_order_id: String,
    pub quality_score: u8,
    pub entry_price: f64,
    pub initial_stop: f64,
    pub current_stop: f64,
    pub take_profit: Option<f64>,
    pub peak_price: f64,
    pub stage: ProtectionStage,
    pub status: TradeStatus,
    pub entered_at: DateTime<Utc>,
    pub exit_price: Option<f64>,
    pub realized_pl: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TradeRecord {
    /// Rebuild the in-memory position, protection state included.
    pub fn to_position(&self) -> Position {
        Position::new(
            self.trade_id.clone(),
            self.account_id.clone(),
            self.instrument.clone(),
            self.direction,
            self.units,
            self.entry_price,
            self.initial_stop,
            self.take_profit,
            self.entered_at,
        )
        .restore(self.current_stop, self.peak_price, self.stage)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub balance: f64,
    pub unrealized_pl: f64,
    pub open_trade_count: u32,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub account_id: String,
    pub date: NaiveDate,
    pub start_balance: f64,
    pub end_balance: f64,
    pub peak_balance: f64,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub realized_pl: f64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PerformanceLedger {
    pool: SqlitePool,
    locks: AccountLocks,
}

impl PerformanceLedger {
    pub async fn connect(cfg: &LedgerConfig) -> Result<Self> {
        Self::connect_url(&cfg.url, cfg.max_connections).await
    }

    /// Connect and run embedded migrations.
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database. One connection that never idles out, so
    /// the schema lives as long as the ledger.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            locks: AccountLocks::new(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the account row if missing and return the stored state.
    /// An existing account keeps its state; `initial_balance` is ignored.
    pub async fn open_account(&self, account_id: &str, initial_balance: f64) -> Result<AccountState> {
        let _guard = self.locks.lock(account_id).await;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            insert into accounts (
              account_id, initial_balance, current_balance, peak_balance,
              daily_start_balance, daily_peak_balance, updated_at_utc
            ) values (?1, ?2, ?2, ?2, ?2, ?2, ?3)
            on conflict(account_id) do nothing
            "#,
        )
        .bind(account_id)
        .bind(initial_balance)
        .bind(fmt_ts(Utc::now()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let state = load_state(&mut tx, account_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))?;
        tx.commit().await?;

        if inserted == 1 {
            tracing::info!(account_id, initial_balance, "ledger account opened");
        } else if state.initial_balance != initial_balance {
            tracing::warn!(
                account_id,
                stored = state.initial_balance,
                configured = initial_balance,
                "configured initial balance differs from ledger; keeping ledger"
            );
        }
        Ok(state)
    }

    pub async fn get_account_state(&self, account_id: &str) -> Result<Option<AccountState>> {
        let mut conn = self.pool.acquire().await?;
        load_state(&mut conn, account_id).await
    }

    /// Insert the open trade and fold the entry into the account state.
    pub async fn record_trade_entry(&self, entry: &TradeEntry) -> Result<AccountState> {
        let _guard = self.locks.lock(&entry.account_id).await;
        let mut tx = self.pool.begin().await?;

        let mut state = load_state(&mut tx, &entry.account_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(entry.account_id.clone()))?;

        let exists: Option<(String,)> = sqlx::query_as("select trade_id from trades where trade_id = ?1")
            .bind(&entry.trade_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_some() {
            return Err(LedgerError::DuplicateTrade {
                trade_id: entry.trade_id.clone(),
            });
        }

        let date = entry.entered_at.date_naive();
        state.record_trade_entry(date);

        sqlx::query(
            r#"
            insert into trades (
              trade_id, account_id, strategy, instrument, direction, units,
              client_order_id, quality_score, entry_price, initial_stop,
              current_stop, take_profit, peak_price, stage, status, entered_at_utc
            ) values (
              ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?11, ?9, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&entry.trade_id)
        .bind(&entry.account_id)
        .bind(&entry.strategy)
        .bind(&entry.instrument)
        .bind(entry.direction.as_str())
        .bind(to_i64(entry.units))
        .bind(&entry.client_order_id)
        .bind(i64::from(entry.quality_score))
        .bind(entry.entry_price)
        .bind(entry.stop_loss)
        .bind(entry.take_profit)
        .bind(ProtectionStage::Initial.as_str())
        .bind(TradeStatus::Open.as_str())
        .bind(fmt_ts(entry.entered_at))
        .execute(&mut *tx)
        .await?;

        store_state(&mut tx, &state).await?;
        upsert_daily(&mut tx, &state, date, 0.0).await?;
        tx.commit().await?;

        tracing::info!(
            account_id = %entry.account_id,
            trade_id = %entry.trade_id,
            instrument = %entry.instrument,
            units = entry.units,
            "trade entry recorded"
        );
        Ok(state)
    }

    /// Close the trade and fold its realized P/L. Fails with
    /// [`LedgerError::ExitWithoutEntry`] and writes nothing if the trade has
    /// no committed open entry for this account.
    pub async fn record_trade_exit(&self, exit: &TradeExit) -> Result<AccountState> {
        let _guard = self.locks.lock(&exit.account_id).await;
        let mut tx = self.pool.begin().await?;

        let open: Option<(String,)> = sqlx::query_as(
            "select trade_id from trades where trade_id = ?1 and account_id = ?2 and status = 'OPEN'",
        )
        .bind(&exit.trade_id)
        .bind(&exit.account_id)
        .fetch_optional(&mut *tx)
        .await?;
        if open.is_none() {
            tracing::error!(
                account_id = %exit.account_id,
                trade_id = %exit.trade_id,
                "exit without committed entry"
            );
            return Err(LedgerError::ExitWithoutEntry {
                trade_id: exit.trade_id.clone(),
            });
        }

        let mut state = load_state(&mut tx, &exit.account_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownAccount(exit.account_id.clone()))?;

        let date = exit.closed_at.date_naive();
        state.record_trade_exit(exit.realized_pl, date);

        sqlx::query(
            r#"
            update trades
               set status = 'CLOSED', exit_price = ?2, realized_pl = ?3, closed_at_utc = ?4
             where trade_id = ?1
            "#,
        )
        .bind(&exit.trade_id)
        .bind(exit.exit_price)
        .bind(exit.realized_pl)
        .bind(fmt_ts(exit.closed_at))
        .execute(&mut *tx)
        .await?;

        store_state(&mut tx, &state).await?;
        upsert_daily(&mut tx, &state, date, exit.realized_pl).await?;
        tx.commit().await?;

        tracing::info!(
            account_id = %exit.account_id,
            trade_id = %exit.trade_id,
            realized_pl = exit.realized_pl,
            balance = state.current_balance,
            "trade exit recorded"
        );
        Ok(state)
    }

    /// Persist a broker-accepted stop move for an open trade.
    pub async fn record_stop_adjustment(&self, adj: &StopAdjustment) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            update trades
               set current_stop = ?2, stage = ?3, peak_price = ?4
             where trade_id = ?1 and status = 'OPEN'
            "#,
        )
        .bind(&adj.trade_id)
        .bind(adj.new_stop)
        .bind(adj.stage.as_str())
        .bind(adj.peak_price)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(LedgerError::TradeNotOpen {
                trade_id: adj.trade_id.clone(),
            });
        }

        sqlx::query(
            r#"
            insert into stop_adjustments (trade_id, previous_stop, new_stop, stage, peak_price, ts_utc)
            values (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&adj.trade_id)
        .bind(adj.previous_stop)
        .bind(adj.new_stop)
        .bind(adj.stage.as_str())
        .bind(adj.peak_price)
        .bind(fmt_ts(adj.ts_utc))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(trade_id = %adj.trade_id, new_stop = adj.new_stop, stage = %adj.stage, "stop adjustment recorded");
        Ok(())
    }

    pub async fn stop_history(&self, trade_id: &str) -> Result<Vec<StopAdjustment>> {
        let rows = sqlx::query(
            r#"
            select trade_id, previous_stop, new_stop, stage, peak_price, ts_utc
              from stop_adjustments
             where trade_id = ?1
             order by id asc
            "#,
        )
        .bind(trade_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<StopAdjustment> {
                let stage: String = r.try_get("stage")?;
                Ok(StopAdjustment {
                    trade_id: r.try_get("trade_id")?,
                    previous_stop: r.try_get("previous_stop")?,
                    new_stop: r.try_get("new_stop")?,
                    stage: parse_stage("stop_adjustments", &stage)?,
                    peak_price: r.try_get("peak_price")?,
                    ts_utc: parse_ts("stop_adjustments", &r.try_get::<String, _>("ts_utc")?)?,
                })
            })
            .collect()
    }

    pub async fn record_snapshot(&self, snap: &AccountSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            insert into snapshots (account_id, balance, unrealized_pl, open_trade_count, ts_utc)
            values (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&snap.account_id)
        .bind(snap.balance)
        .bind(snap.unrealized_pl)
        .bind(i64::from(snap.open_trade_count))
        .bind(fmt_ts(snap.ts_utc))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_latest_snapshot(&self, account_id: &str) -> Result<Option<AccountSnapshot>> {
        let row = sqlx::query(
            r#"
            select account_id, balance, unrealized_pl, open_trade_count, ts_utc
              from snapshots
             where account_id = ?1
             order by id desc
             limit 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        Ok(Some(AccountSnapshot {
            account_id: r.try_get("account_id")?,
            balance: r.try_get("balance")?,
            unrealized_pl: r.try_get("unrealized_pl")?,
            open_trade_count: to_u32("snapshots", r.try_get("open_trade_count")?)?,
            ts_utc: parse_ts("snapshots", &r.try_get::<String, _>("ts_utc")?)?,
        }))
    }

    /// The `days` most recent trading days with activity, oldest first.
    pub async fn get_daily_summary(&self, account_id: &str, days: u32) -> Result<Vec<DailySummary>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            select account_id, trade_date, start_balance, end_balance, peak_balance,
                   trades, wins, losses, realized_pl
              from daily_summaries
             where account_id = ?1
             order by trade_date desc
             limit ?2
            "#,
        )
        .bind(account_id)
        .bind(i64::from(days))
        .fetch_all(&self.pool)
        .await?;

        let mut out = rows
            .iter()
            .map(|r| -> Result<DailySummary> {
                let date: String = r.try_get("trade_date")?;
                Ok(DailySummary {
                    account_id: r.try_get("account_id")?,
                    date: parse_date("daily_summaries", &date)?,
                    start_balance: r.try_get("start_balance")?,
                    end_balance: r.try_get("end_balance")?,
                    peak_balance: r.try_get("peak_balance")?,
                    trades: to_u32("daily_summaries", r.try_get("trades")?)?,
                    wins: to_u32("daily_summaries", r.try_get("wins")?)?,
                    losses: to_u32("daily_summaries", r.try_get("losses")?)?,
                    realized_pl: r.try_get("realized_pl")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        out.reverse();
        Ok(out)
    }

    pub async fn open_trades(&self, account_id: &str) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(&format!(
            "{TRADE_COLUMNS} where account_id = ?1 and status = 'OPEN' order by entered_at_utc asc, trade_id asc"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(trade_from_row).collect()
    }

    pub async fn trade(&self, trade_id: &str) -> Result<Option<TradeRecord>> {
        let row = sqlx::query(&format!("{TRADE_COLUMNS} where trade_id = ?1"))
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(trade_from_row).transpose()
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

const TRADE_COLUMNS: &str = r#"
select trade_id, account_id, strategy, instrument, direction, units, client_order_id,
       quality_score, entry_price, initial_stop, current_stop, take_profit, peak_price,
       stage, status, entered_at_utc, exit_price, realized_pl, closed_at_utc
  from trades
"#;

async fn load_state(conn: &mut SqliteConnection, account_id: &str) -> Result<Option<AccountState>> {
    let row = sqlx::query(
        r#"
        select account_id, initial_balance, current_balance, peak_balance,
               daily_start_balance, daily_peak_balance, trades_today, total_trades,
               wins, losses, consecutive_losses, max_consecutive_losses,
               trading_days, last_trade_date
          from accounts
         where account_id = ?1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(r) = row else {
        return Ok(None);
    };
    let last: Option<String> = r.try_get("last_trade_date")?;
    Ok(Some(AccountState {
        account_id: r.try_get("account_id")?,
        initial_balance: r.try_get("initial_balance")?,
        current_balance: r.try_get("current_balance")?,
        peak_balance: r.try_get("peak_balance")?,
        daily_start_balance: r.try_get("daily_start_balance")?,
        daily_peak_balance: r.try_get("daily_peak_balance")?,
        trades_today: to_u32("accounts", r.try_get("trades_today")?)?,
        total_trades: to_u32("accounts", r.try_get("total_trades")?)?,
        wins: to_u32("accounts", r.try_get("wins")?)?,
        losses: to_u32("accounts", r.try_get("losses")?)?,
        consecutive_losses: to_u32("accounts", r.try_get("consecutive_losses")?)?,
        max_consecutive_losses: to_u32("accounts", r.try_get("max_consecutive_losses")?)?,
        trading_days: to_u32("accounts", r.try_get("trading_days")?)?,
        last_trade_date: last.as_deref().map(|d| parse_date("accounts", d)).transpose()?,
    }))
}

async fn store_state(conn: &mut SqliteConnection, st: &AccountState) -> Result<()> {
    sqlx::query(
        r#"
        update accounts set
          current_balance = ?2, peak_balance = ?3, daily_start_balance = ?4,
          daily_peak_balance = ?5, trades_today = ?6, total_trades = ?7, wins = ?8,
          losses = ?9, consecutive_losses = ?10, max_consecutive_losses = ?11,
          trading_days = ?12, last_trade_date = ?13, updated_at_utc = ?14
        where account_id = ?1
        "#,
    )
    .bind(&st.account_id)
    .bind(st.current_balance)
    .bind(st.peak_balance)
    .bind(st.daily_start_balance)
    .bind(st.daily_peak_balance)
    .bind(i64::from(st.trades_today))
    .bind(i64::from(st.total_trades))
    .bind(i64::from(st.wins))
    .bind(i64::from(st.losses))
    .bind(i64::from(st.consecutive_losses))
    .bind(i64::from(st.max_consecutive_losses))
    .bind(i64::from(st.trading_days))
    .bind(st.last_trade_date.map(|d| d.format(DATE_FMT).to_string()))
    .bind(fmt_ts(Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Fold one event into the day's rollup. `pnl` is 0 for entries.
async fn upsert_daily(conn: &mut SqliteConnection, st: &AccountState, date: NaiveDate, pnl: f64) -> Result<()> {
    let (win, loss) = if pnl > 0.0 {
        (1_i64, 0_i64)
    } else if pnl < 0.0 {
        (0, 1)
    } else {
        (0, 0)
    };
    sqlx::query(
        r#"
        insert into daily_summaries (
          account_id, trade_date, start_balance, end_balance, peak_balance,
          trades, wins, losses, realized_pl
        ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        on conflict(account_id, trade_date) do update set
          end_balance = excluded.end_balance,
          peak_balance = excluded.peak_balance,
          trades = excluded.trades,
          wins = daily_summaries.wins + excluded.wins,
          losses = daily_summaries.losses + excluded.losses,
          realized_pl = daily_summaries.realized_pl + excluded.realized_pl
        "#,
    )
    .bind(&st.account_id)
    .bind(date.format(DATE_FMT).to_string())
    .bind(st.daily_start_balance)
    .bind(st.current_balance)
    .bind(st.daily_peak_balance)
    .bind(i64::from(st.trades_today))
    .bind(win)
    .bind(loss)
    .bind(pnl)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn trade_from_row(r: &SqliteRow) -> Result<TradeRecord> {
    const T: &str = "trades";
    let direction: String = r.try_get("direction")?;
    let direction = match direction.as_str() {
        "LONG" => Direction::Long,
        "SHORT" => Direction::Short,
        other => return Err(LedgerError::corrupt(T, format!("direction {other:?}"))),
    };
    let status: String = r.try_get("status")?;
    let status = match status.as_str() {
        "OPEN" => TradeStatus::Open,
        "CLOSED" => TradeStatus::Closed,
        other => return Err(LedgerError::corrupt(T, format!("status {other:?}"))),
    };
    let units: i64 = r.try_get("units")?;
    let units = u64::try_from(units).map_err(|_| LedgerError::corrupt(T, format!("units {units}")))?;
    let score: i64 = r.try_get("quality_score")?;
    let quality_score = u8::try_from(score).map_err(|_| LedgerError::corrupt(T, format!("quality_score {score}")))?;
    let stage: String = r.try_get("stage")?;
    let closed_at: Option<String> = r.try_get("closed_at_utc")?;

    Ok(TradeRecord {
        trade_id: r.try_get("trade_id")?,
        account_id: r.try_get("account_id")?,
        strategy: r.try_get("strategy")?,
        instrument: r.try_get("instrument")?,
        direction,
        units,
        client_order_id: r.try_get("client_order_id")?,
        quality_score,
        entry_price: r.try_get("entry_price")?,
        initial_stop: r.try_get("initial_stop")?,
        current_stop: r.try_get("current_stop")?,
        take_profit: r.try_get("take_profit")?,
        peak_price: r.try_get("peak_price")?,
        stage: parse_stage(T, &stage)?,
        status,
        entered_at: parse_ts(T, &r.try_get::<String, _>("entered_at_utc")?)?,
        exit_price: r.try_get("exit_price")?,
        realized_pl: r.try_get("realized_pl")?,
        closed_at: closed_at.as_deref().map(|s| parse_ts(T, s)).transpose()?,
    })
}

const DATE_FMT: &str = "%Y-%m-%d";

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(table: &'static str, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| LedgerError::corrupt(table, format!("timestamp {s:?}: {e}")))
}

fn parse_date(table: &'static str, s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| LedgerError::corrupt(table, format!("date {s:?}: {e}")))
}

fn parse_stage(table: &'static str, s: &str) -> Result<ProtectionStage> {
    ProtectionStage::parse(s).ok_or_else(|| LedgerError::corrupt(table, format!("stage {s:?}")))
}

fn to_u32(table: &'static str, v: i64) -> Result<u32> {
    u32::try_from(v).map_err(|_| LedgerError::corrupt(table, format!("counter {v} out of range")))
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

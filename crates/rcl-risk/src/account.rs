use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-account risk bookkeeping.
///
/// Mutated only through [`record_trade_entry`](Self::record_trade_entry) and
/// [`record_trade_exit`](Self::record_trade_exit). Peaks only ratchet up, and
/// the daily reference balance moves only on the first trade event of a new
/// calendar day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_id: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub peak_balance: f64,
    pub daily_start_balance: f64,
    pub daily_peak_balance: f64,
    pub trades_today: u32,
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub consecutive_losses: u32,
    pub max_consecutive_losses: u32,
    pub trading_days: u32,
    pub last_trade_date: Option<NaiveDate>,
}

impl AccountState {
    pub fn new(account_id: impl Into<String>, initial_balance: f64) -> Self {
        Self {
            account_id: account_id.into(),
            initial_balance,
            current_balance: initial_balance,
            peak_balance: initial_balance,
            daily_start_balance: initial_balance,
            daily_peak_balance: initial_balance,
            trades_today: 0,
            total_trades: 0,
            wins: 0,
            losses: 0,
            consecutive_losses: 0,
            max_consecutive_losses: 0,
            trading_days: 0,
            last_trade_date: None,
        }
    }

    /// Start a new trading day if `date` differs from the last trade date.
    /// Returns true when a roll happened.
    pub fn roll_day(&mut self, date: NaiveDate) -> bool {
        if self.last_trade_date == Some(date) {
            return false;
        }
        self.daily_start_balance = self.current_balance;
        self.daily_peak_balance = self.current_balance;
        self.trades_today = 0;
        self.trading_days += 1;
        self.last_trade_date = Some(date);
        true
    }

    /// The state as the gate should see it on `date`.
    ///
    /// A later date starts a fresh daily window (reference balance and trade
    /// count reset) without counting a trading day. Same or earlier dates
    /// return the state unchanged.
    pub fn as_of(&self, date: NaiveDate) -> AccountState {
        let mut st = self.clone();
        if st.last_trade_date.is_some_and(|last| date > last) {
            st.daily_start_balance = st.current_balance;
            st.daily_peak_balance = st.current_balance;
            st.trades_today = 0;
        }
        st
    }

    pub fn record_trade_entry(&mut self, date: NaiveDate) {
        self.roll_day(date);
        self.trades_today += 1;
        self.total_trades += 1;
    }

    /// Fold a realized P/L. A zero P/L is a scratch: it neither wins nor
    /// loses and leaves the loss streak alone.
    pub fn record_trade_exit(&mut self, pnl: f64, date: NaiveDate) {
        self.roll_day(date);
        self.current_balance += pnl;
        if self.current_balance > self.peak_balance {
            self.peak_balance = self.current_balance;
        }
        if self.current_balance > self.daily_peak_balance {
            self.daily_peak_balance = self.current_balance;
        }

        if pnl > 0.0 {
            self.wins += 1;
            self.consecutive_losses = 0;
        } else if pnl < 0.0 {
            self.losses += 1;
            self.consecutive_losses += 1;
            self.max_consecutive_losses = self.max_consecutive_losses.max(self.consecutive_losses);
        }
    }

    /// Wins over decided (non-scratch) trades; 0 when nothing is decided yet.
    pub fn win_rate(&self) -> f64 {
        let decided = self.wins + self.losses;
        if decided == 0 {
            0.0
        } else {
            self.wins as f64 / decided as f64
        }
    }

    /// Loss from the day's starting balance as a fraction, floored at 0.
    pub fn daily_drawdown(&self) -> f64 {
        drawdown(self.daily_start_balance, self.current_balance)
    }

    /// Loss from the peak balance as a fraction, floored at 0.
    pub fn total_drawdown(&self) -> f64 {
        drawdown(self.peak_balance, self.current_balance)
    }

    /// Profit relative to the initial balance.
    pub fn profit_pct(&self) -> f64 {
        if self.initial_balance <= 0.0 {
            return 0.0;
        }
        (self.current_balance - self.initial_balance) / self.initial_balance
    }
}

fn drawdown(reference: f64, current: f64) -> f64 {
    if reference <= 0.0 {
        return 0.0;
    }
    ((reference - current) / reference).max(0.0)
}

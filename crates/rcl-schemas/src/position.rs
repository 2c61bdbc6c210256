use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Direction;

/// Protection stage of an open position. Ordered: a position only ever moves
/// forward through `Initial -> Breakeven -> Trailing`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectionStage {
    Initial,
    Breakeven,
    Trailing,
}

impl ProtectionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtectionStage::Initial => "INITIAL",
            ProtectionStage::Breakeven => "BREAKEVEN",
            ProtectionStage::Trailing => "TRAILING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIAL" => Some(ProtectionStage::Initial),
            "BREAKEVEN" => Some(ProtectionStage::Breakeven),
            "TRAILING" => Some(ProtectionStage::Trailing),
            _ => None,
        }
    }
}

impl fmt::Display for ProtectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filled position under protection.
///
/// Entry price and direction are fixed at construction. Only the peak
/// favorable price, the protection stage and the stop-loss change afterwards,
/// and each of them only in the protective direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: String,
    pub account_id: String,
    pub instrument: String,
    pub units: u64,
    pub take_profit: Option<f64>,
    pub entered_at: DateTime<Utc>,
    direction: Direction,
    entry_price: f64,
    current_stop: f64,
    peak_price: f64,
    stage: ProtectionStage,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trade_id: impl Into<String>,
        account_id: impl Into<String>,
        instrument: impl Into<String>,
        direction: Direction,
        units: u64,
        entry_price: f64,
        stop_loss: f64,
        take_profit: Option<f64>,
        entered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trade_id: trade_id.into(),
            account_id: account_id.into(),
            instrument: instrument.into(),
            units,
            take_profit,
            entered_at,
            direction,
            entry_price,
            current_stop: stop_loss,
            peak_price: entry_price,
            stage: ProtectionStage::Initial,
        }
    }

    /// Rebuild a position from persisted protection state (restart path).
    pub fn restore(mut self, current_stop: f64, peak_price: f64, stage: ProtectionStage) -> Self {
        self.current_stop = current_stop;
        self.peak_price = peak_price;
        self.stage = stage;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn current_stop(&self) -> f64 {
        self.current_stop
    }

    pub fn peak_price(&self) -> f64 {
        self.peak_price
    }

    pub fn stage(&self) -> ProtectionStage {
        self.stage
    }

    /// Profit relative to entry as a fraction (0.01 == +1%), sign-adjusted
    /// for direction.
    pub fn profit_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.direction.sign() * (price - self.entry_price) / self.entry_price
    }

    /// True if `candidate` is a strictly more protective stop than `current`
    /// for this position's direction.
    pub fn is_more_protective(&self, candidate: f64, current: f64) -> bool {
        match self.direction {
            Direction::Long => candidate > current,
            Direction::Short => candidate < current,
        }
    }

    /// Ratchet the peak favorable price. Idempotent.
    pub fn observe_price(&mut self, price: f64) {
        let better = match self.direction {
            Direction::Long => price > self.peak_price,
            Direction::Short => price < self.peak_price,
        };
        if better {
            self.peak_price = price;
        }
    }

    /// Move the stage forward. Returns false (and changes nothing) for a
    /// backward or same-stage request.
    pub fn advance_stage(&mut self, stage: ProtectionStage) -> bool {
        if stage > self.stage {
            self.stage = stage;
            true
        } else {
            false
        }
    }

    /// Commit a broker-accepted stop. Refuses anything that is not strictly
    /// more protective than the current stop.
    pub fn commit_stop(&mut self, new_stop: f64) -> bool {
        if self.is_more_protective(new_stop, self.current_stop) {
            self.current_stop = new_stop;
            true
        } else {
            false
        }
    }
}

//! rcl-schemas
//!
//! Shared domain vocabulary for the risk & execution control layer:
//! directions, instrument classes, quotes, trade candidates, positions and
//! the structured control events every other crate emits.
//!
//! No IO. The only runtime dependency is the tokio broadcast channel behind
//! [`EventBus`].

mod events;
mod instrument;
mod position;

pub use events::{ControlEvent, EventBus};
pub use instrument::{ContractSpec, InstrumentClass};
pub use position::{Position, ProtectionStage};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction. Serialized as `LONG` / `SHORT`; `BUY` / `SELL` are
/// accepted on input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[serde(alias = "BUY", alias = "buy", alias = "long")]
    Long,
    #[serde(alias = "SELL", alias = "sell", alias = "short")]
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-of-book quote for one instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub instrument: String,
    pub bid: f64,
    pub ask: f64,
    pub ts_utc: DateTime<Utc>,
}

impl Quote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Price a position in `direction` would be closed at (longs sell the bid).
    pub fn exit_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.bid,
            Direction::Short => self.ask,
        }
    }

    /// Price a new position in `direction` would be opened at.
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }
}

/// Indicator values a strategy attaches to a candidate.
///
/// Computing these is the strategy's business; the control layer only reads
/// them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorSnapshot {
    pub momentum: f64,
    /// Trend-strength index (ADX-like, 0..100).
    pub trend_strength: f64,
    /// Volatility measure (ATR-like, price units).
    pub volatility: f64,
    /// Spread observed when the signal fired (price units).
    pub spread: f64,
    pub fast_avg: f64,
    pub mid_avg: f64,
    pub slow_avg: f64,
}

/// A proposed trade, produced once per signal evaluation and then either
/// discarded or promoted into a [`Position`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradeCandidate {
    pub account_id: String,
    pub strategy: String,
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub indicators: IndicatorSnapshot,
    #[serde(default)]
    pub rationale: String,
    pub generated_at: DateTime<Utc>,
}

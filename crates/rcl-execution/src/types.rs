use chrono::{DateTime, Utc};
use rcl_schemas::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A market order with its protective levels attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    /// Caller-chosen idempotency key; also how an unknown outcome is found
    /// again in the broker's open trades.
    pub client_order_id: String,
    pub account_id: String,
    pub instrument: String,
    /// Positive = buy, negative = sell.
    pub units: i64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl MarketOrderRequest {
    pub fn new(
        client_order_id: impl Into<String>,
        account_id: impl Into<String>,
        instrument: impl Into<String>,
        direction: Direction,
        units: u64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        let magnitude = i64::try_from(units).unwrap_or(i64::MAX);
        let units = match direction {
            Direction::Long => magnitude,
            Direction::Short => -magnitude,
        };
        Self {
            client_order_id: client_order_id.into(),
            account_id: account_id.into(),
            instrument: instrument.into(),
            units,
            stop_loss,
            take_profit,
        }
    }

    pub fn direction(&self) -> Direction {
        if self.units < 0 {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Filled,
    /// Accepted but not yet filled. Treated as unverified.
    Pending,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub trade_id: Option<String>,
    pub fill_price: Option<f64>,
    pub status: OrderStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub balance: f64,
    pub unrealized_pl: f64,
    pub open_trade_count: u32,
}

/// A trade as listed by the broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub trade_id: String,
    pub client_order_id: Option<String>,
    pub instrument: String,
    /// Signed like [`MarketOrderRequest::units`].
    pub units: i64,
    pub price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub unrealized_pl: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeState {
    Open,
    Closed {
        exit_price: f64,
        realized_pl: f64,
        closed_at: DateTime<Utc>,
    },
    NotFound,
}

/// A fill the gateway has seen in the broker's own trade list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedFill {
    pub order_id: Option<String>,
    pub trade_id: String,
    pub fill_price: f64,
    pub units: u64,
}

/// Outcome of one market order submission.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderOutcome {
    Confirmed(ConfirmedFill),
    /// The broker refused the order. Nothing is open.
    Rejected { reason: String },
    /// The order may or may not be live. Needs manual verification; the
    /// gateway never resubmits it.
    Unknown { detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("broker call {op} timed out after {after_ms}ms")]
    Timeout { op: &'static str, after_ms: u64 },

    #[error("broker rejected request: {0}")]
    Rejected(String),

    #[error("broker transport failure: {0}")]
    Transport(String),
}

impl BrokerError {
    /// Timeouts and transport failures may succeed on a later attempt;
    /// rejections will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Timeout { .. } | BrokerError::Transport(_))
    }
}

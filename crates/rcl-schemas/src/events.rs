//! Structured control events.
//!
//! The control layer never formats user-facing text; a notification layer
//! subscribes to the [`EventBus`] and renders these however it likes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{Direction, ProtectionStage};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    TradeApproved {
        account_id: String,
        strategy: String,
        instrument: String,
        direction: Direction,
        units: u64,
        quality_score: u8,
        ts_utc: DateTime<Utc>,
    },
    TradeDenied {
        account_id: String,
        strategy: String,
        instrument: String,
        direction: Direction,
        reason: String,
        ts_utc: DateTime<Utc>,
    },
    PositionOpened {
        account_id: String,
        trade_id: String,
        instrument: String,
        direction: Direction,
        units: u64,
        fill_price: f64,
        ts_utc: DateTime<Utc>,
    },
    StopAdjusted {
        account_id: String,
        trade_id: String,
        previous_stop: f64,
        new_stop: f64,
        ts_utc: DateTime<Utc>,
    },
    ProtectionStageChanged {
        account_id: String,
        trade_id: String,
        from: ProtectionStage,
        to: ProtectionStage,
        ts_utc: DateTime<Utc>,
    },
    PositionClosed {
        account_id: String,
        trade_id: String,
        exit_price: f64,
        realized_pl: f64,
        ts_utc: DateTime<Utc>,
    },
    DailyDrawdownBreached {
        account_id: String,
        daily_drawdown: f64,
        limit: f64,
        ts_utc: DateTime<Utc>,
    },
    OrderOutcomeUnknown {
        account_id: String,
        instrument: String,
        client_order_id: String,
        detail: String,
        ts_utc: DateTime<Utc>,
    },
    EmotionalTradingWarning {
        account_id: String,
        matched_terms: Vec<String>,
        ts_utc: DateTime<Utc>,
    },
    PolicyLocked {
        policy: String,
        ts_utc: DateTime<Utc>,
    },
    PolicyUnlocked {
        policy: String,
        ts_utc: DateTime<Utc>,
    },
    PolicyUpdated {
        policy: String,
        action: String,
        ts_utc: DateTime<Utc>,
    },
}

/// Cloneable broadcast handle for [`ControlEvent`]s.
///
/// Publishing never blocks and never fails the caller: with no subscribers
/// the event is simply dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ControlEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: ControlEvent) {
        let _ = self.tx.send(ev);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<ControlEvent> {
        self.tx.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

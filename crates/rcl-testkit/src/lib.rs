//! Scenario harness for the control layer.
//!
//! Builds the whole stack (policy store, ledger, paper broker, gateway,
//! scorer, event bus) from one YAML control document, in a temp dir, with
//! no network and no files outside the temp dir.

mod harness;
mod signals;

pub use harness::{drain_events, ControlHarness};
pub use signals::{ScriptHandle, ScriptedSignals};

use chrono::{TimeZone, Utc};
use rcl_schemas::{Direction, IndicatorSnapshot, TradeCandidate};

/// Indicators that clear every default quality check for EUR_USD.
pub fn passing_indicators() -> IndicatorSnapshot {
    IndicatorSnapshot {
        momentum: 0.001,
        trend_strength: 30.0,
        volatility: 0.001,
        spread: 0.0001,
        fast_avg: 1.0998,
        mid_avg: 1.0990,
        slow_avg: 1.0980,
    }
}

/// A long candidate with passing indicators and a fixed timestamp.
pub fn long_candidate(
    account_id: &str,
    strategy: &str,
    instrument: &str,
    entry: f64,
    stop_loss: f64,
    take_profit: f64,
) -> TradeCandidate {
    TradeCandidate {
        account_id: account_id.to_string(),
        strategy: strategy.to_string(),
        instrument: instrument.to_string(),
        direction: Direction::Long,
        entry_price: entry,
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
        indicators: passing_indicators(),
        rationale: "fast average crossed above mid".to_string(),
        generated_at: Utc
            .with_ymd_and_hms(2026, 3, 10, 10, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
    }
}

//! rcl-protect
//!
//! Post-entry profit protection: `INITIAL -> BREAKEVEN -> TRAILING`.
//!
//! The engine only proposes stops. A [`StopUpdate`] is committed to the
//! position through [`ProtectionEngine::apply`] once the broker has accepted
//! the modification; until then the position keeps its old stop and stage,
//! and the same update is proposed again on the next tick.

use rcl_config::ProtectionSection;
use rcl_schemas::{Direction, Position, ProtectionStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopUpdate {
    pub trade_id: String,
    pub from_stage: ProtectionStage,
    pub to_stage: ProtectionStage,
    pub previous_stop: f64,
    pub new_stop: f64,
    pub peak_price: f64,
}

impl StopUpdate {
    pub fn changes_stage(&self) -> bool {
        self.to_stage != self.from_stage
    }
}

/// Partial close proposal. Never produced: winners run to their stop or
/// target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartialClose {
    pub trade_id: String,
    pub units: u64,
}

/// Protection state machine plus the registry of open positions of one
/// account loop.
#[derive(Clone, Debug)]
pub struct ProtectionEngine {
    params: ProtectionSection,
    positions: BTreeMap<String, Position>,
}

impl ProtectionEngine {
    pub fn new(params: ProtectionSection) -> Self {
        Self {
            params,
            positions: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &ProtectionSection {
        &self.params
    }

    /// Takes effect on the next evaluation. Stages already reached are kept.
    pub fn set_params(&mut self, params: ProtectionSection) {
        self.params = params;
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    pub fn register(&mut self, position: Position) {
        tracing::debug!(trade_id = %position.trade_id, instrument = %position.instrument, "position registered");
        self.positions.insert(position.trade_id.clone(), position);
    }

    pub fn unregister(&mut self, trade_id: &str) -> Option<Position> {
        self.positions.remove(trade_id)
    }

    pub fn get(&self, trade_id: &str) -> Option<&Position> {
        self.positions.get(trade_id)
    }

    pub fn get_mut(&mut self, trade_id: &str) -> Option<&mut Position> {
        self.positions.get_mut(trade_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn positions_for<'a>(&'a self, instrument: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions.values().filter(move |p| p.instrument == instrument)
    }

    pub fn trade_ids_for(&self, instrument: &str) -> Vec<String> {
        self.positions_for(instrument).map(|p| p.trade_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Units currently open on `instrument`.
    pub fn open_units(&self, instrument: &str) -> u64 {
        self.positions_for(instrument).map(|p| p.units).sum()
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Evaluate one registered position at `price`.
    pub fn evaluate(&mut self, trade_id: &str, price: f64) -> Option<StopUpdate> {
        let params = self.params.clone();
        let position = self.positions.get_mut(trade_id)?;
        evaluate_position(&params, position, price)
    }

    /// Commit a broker-accepted update. Returns false if the position is gone
    /// or the update no longer improves its stop.
    pub fn apply(&mut self, update: &StopUpdate) -> bool {
        let Some(position) = self.positions.get_mut(&update.trade_id) else {
            return false;
        };
        if !position.commit_stop(update.new_stop) {
            return false;
        }
        position.advance_stage(update.to_stage);
        true
    }

    pub fn should_close_partial(&self, _position: &Position, _price: f64) -> Option<PartialClose> {
        None
    }
}

/// One protection step for `position` at `price`.
///
/// Updates the peak favorable price (idempotent), derives the stage, and
/// returns a proposal only when the most protective candidate strictly
/// improves the current stop while staying on the protective side of
/// `price`. A stage advance that needs no stop change is applied directly.
pub fn evaluate_position(
    params: &ProtectionSection,
    position: &mut Position,
    price: f64,
) -> Option<StopUpdate> {
    if !price.is_finite() || price <= 0.0 {
        tracing::warn!(trade_id = %position.trade_id, price, "ignoring non-positive price");
        return None;
    }

    position.observe_price(price);
    let profit = position.profit_pct(price);
    let from_stage = position.stage();

    let mut stage = from_stage;
    if stage == ProtectionStage::Initial && profit >= params.breakeven_threshold {
        stage = ProtectionStage::Breakeven;
    }
    if stage >= ProtectionStage::Breakeven && profit >= params.trail_activation {
        stage = ProtectionStage::Trailing;
    }

    let direction = position.direction();
    let current = position.current_stop();
    let mut candidate = current;

    if stage >= ProtectionStage::Breakeven {
        candidate = most_protective(direction, candidate, position.entry_price());
    }
    if stage == ProtectionStage::Trailing {
        let peak = position.peak_price();
        let trail = match direction {
            Direction::Long => peak * (1.0 - params.trail_distance),
            Direction::Short => peak * (1.0 + params.trail_distance),
        };
        candidate = most_protective(direction, candidate, trail);
    }

    let protective_side = match direction {
        Direction::Long => candidate < price,
        Direction::Short => candidate > price,
    };

    if position.is_more_protective(candidate, current) && protective_side {
        return Some(StopUpdate {
            trade_id: position.trade_id.clone(),
            from_stage,
            to_stage: stage,
            previous_stop: current,
            new_stop: candidate,
            peak_price: position.peak_price(),
        });
    }

    if stage > from_stage {
        position.advance_stage(stage);
        tracing::debug!(
            trade_id = %position.trade_id,
            from = %from_stage,
            to = %stage,
            "protection stage advanced without stop change"
        );
    }
    None
}

fn most_protective(direction: Direction, a: f64, b: f64) -> f64 {
    match direction {
        Direction::Long => a.max(b),
        Direction::Short => a.min(b),
    }
}

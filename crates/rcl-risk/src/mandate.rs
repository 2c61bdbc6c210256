use chrono::{DateTime, Utc};
use rcl_config::MandateConfig;
use rcl_schemas::{Direction, InstrumentClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trade as the mandate sees it, including current exposure.
#[derive(Clone, Debug, PartialEq)]
pub struct MandateRequest<'a> {
    pub instrument: &'a str,
    pub direction: Direction,
    pub units: u64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub open_positions: usize,
    pub open_units: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MandateVerdict {
    Approved,
    Rejected(MandateRejection),
}

impl MandateVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, MandateVerdict::Approved)
    }
}

/// One variant per mandate rule, in evaluation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MandateRejection {
    WrongInstrument { expected: String, got: String },
    WrongDirection { allowed: Direction, got: Direction },
    UnitsOverCap { units: u64, max: u64 },
    TooManyPositions { open: usize, max: u32 },
    ExposureOverCap { total: u64, max: u64 },
    OutsideEntryZones { price: f64 },
    MissingStopLoss,
    MissingTakeProfit,
    StopDistanceOutOfBand { pips: f64, min: f64, max: f64 },
    TakeProfitTooClose { pips: f64, min: f64 },
    RiskRewardTooLow { ratio: f64, min: f64 },
    OutsideSession { at: DateTime<Utc> },
}

impl fmt::Display for MandateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MandateRejection::*;
        match self {
            WrongInstrument { expected, got } => {
                write!(f, "Mandate allows only {expected} (got {got})")
            }
            WrongDirection { allowed, got } => {
                write!(f, "Mandate allows only {allowed} trades (got {got})")
            }
            UnitsOverCap { units, max } => write!(f, "Order size {units} exceeds mandate cap {max}"),
            TooManyPositions { open, max } => {
                write!(f, "Mandate position limit reached ({open} >= {max})")
            }
            ExposureOverCap { total, max } => {
                write!(f, "Total exposure {total} would exceed mandate cap {max}")
            }
            OutsideEntryZones { price } => write!(f, "Entry {price} is outside the mandate entry zones"),
            MissingStopLoss => f.write_str("Mandate requires a stop loss"),
            MissingTakeProfit => f.write_str("Mandate requires a take profit"),
            StopDistanceOutOfBand { pips, min, max } => write!(
                f,
                "Stop distance {pips:.1} pips outside mandate band [{min:.1}, {max:.1}]"
            ),
            TakeProfitTooClose { pips, min } => {
                write!(f, "Take profit {pips:.1} pips is closer than mandate minimum {min:.1}")
            }
            RiskRewardTooLow { ratio, min } => {
                write!(f, "Mandate risk:reward too low ({ratio:.2} < {min:.2})")
            }
            OutsideSession { at } => {
                write!(f, "{} UTC is outside the mandate trading sessions", at.format("%H:%M"))
            }
        }
    }
}

/// Rule engine for one mandate-restricted account.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeValidator {
    mandate: MandateConfig,
    pip_size: f64,
}

impl TradeValidator {
    pub fn new(mandate: MandateConfig, class: InstrumentClass) -> Self {
        Self {
            mandate,
            pip_size: class.pip_size(),
        }
    }

    pub fn mandate(&self) -> &MandateConfig {
        &self.mandate
    }

    /// Checks in fixed order, first failure wins. Distances are signed in the
    /// mandate direction, so a stop or target on the wrong side of entry
    /// comes out negative and fails its band.
    pub fn validate_trade(&self, req: &MandateRequest<'_>, now: DateTime<Utc>) -> MandateVerdict {
        match self.check(req, now) {
            Ok(()) => MandateVerdict::Approved,
            Err(r) => MandateVerdict::Rejected(r),
        }
    }

    fn check(&self, req: &MandateRequest<'_>, now: DateTime<Utc>) -> Result<(), MandateRejection> {
        let m = &self.mandate;

        if req.instrument != m.instrument {
            return Err(MandateRejection::WrongInstrument {
                expected: m.instrument.clone(),
                got: req.instrument.to_string(),
            });
        }
        if req.direction != m.direction {
            return Err(MandateRejection::WrongDirection {
                allowed: m.direction,
                got: req.direction,
            });
        }
        if req.units > m.max_units {
            return Err(MandateRejection::UnitsOverCap {
                units: req.units,
                max: m.max_units,
            });
        }
        if req.open_positions >= m.max_concurrent_positions as usize {
            return Err(MandateRejection::TooManyPositions {
                open: req.open_positions,
                max: m.max_concurrent_positions,
            });
        }
        let total = req.open_units.saturating_add(req.units);
        if total > m.max_total_units {
            return Err(MandateRejection::ExposureOverCap {
                total,
                max: m.max_total_units,
            });
        }
        if !m.entry_zones.iter().any(|z| z.contains(req.entry_price)) {
            return Err(MandateRejection::OutsideEntryZones {
                price: req.entry_price,
            });
        }

        let stop = req.stop_loss.ok_or(MandateRejection::MissingStopLoss)?;
        let target = req.take_profit.ok_or(MandateRejection::MissingTakeProfit)?;

        let sign = m.direction.sign();
        let stop_pips = sign * (req.entry_price - stop) / self.pip_size;
        let band = m.stop_distance_pips;
        if !(stop_pips >= band.min && stop_pips <= band.max) {
            return Err(MandateRejection::StopDistanceOutOfBand {
                pips: stop_pips,
                min: band.min,
                max: band.max,
            });
        }

        let tp_pips = sign * (target - req.entry_price) / self.pip_size;
        if !(tp_pips >= m.min_take_profit_pips) || tp_pips <= 0.0 {
            return Err(MandateRejection::TakeProfitTooClose {
                pips: tp_pips,
                min: m.min_take_profit_pips,
            });
        }

        let ratio = tp_pips / stop_pips;
        if ratio < m.min_risk_reward {
            return Err(MandateRejection::RiskRewardTooLow {
                ratio,
                min: m.min_risk_reward,
            });
        }

        if !m.sessions.is_empty() && !m.sessions.iter().any(|s| s.contains(now)) {
            return Err(MandateRejection::OutsideSession { at: now });
        }
        Ok(())
    }
}

use rcl_config::{AccountLimits, RiskPolicy};
use rcl_schemas::{ContractSpec, Direction};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AccountState, RiskError};

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
    Allowed,
    Denied(Denial),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Why a trade was refused. `Display` is the operator-facing reason and is
/// forwarded verbatim in denial events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Denial {
    InvalidAccountState { detail: String },
    DailyDrawdown { drawdown: f64, limit: f64 },
    TotalDrawdown { drawdown: f64, limit: f64 },
    DailyTradeLimit { trades: u32, max: u32 },
    MaxConcurrentPositions { open: usize, max: u32 },
    LossStreak { streak: u32, max: u32 },
    MissingStopLoss,
    MissingTakeProfit,
    ProtectiveLevelsInverted { direction: Direction },
    RiskRewardTooLow { ratio: f64, min: f64 },
    Sizing { detail: String },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::InvalidAccountState { detail } => write!(f, "Invalid account state: {detail}"),
            Denial::DailyDrawdown { drawdown, limit } => write!(
                f,
                "Daily drawdown limit breached ({:.2}% >= {:.2}%)",
                drawdown * 100.0,
                limit * 100.0
            ),
            Denial::TotalDrawdown { drawdown, limit } => write!(
                f,
                "Total drawdown limit breached ({:.2}% >= {:.2}%)",
                drawdown * 100.0,
                limit * 100.0
            ),
            Denial::DailyTradeLimit { trades, max } => {
                write!(f, "Daily trade limit reached ({trades} >= {max})")
            }
            Denial::MaxConcurrentPositions { open, max } => {
                write!(f, "Max concurrent positions reached ({open} >= {max})")
            }
            Denial::LossStreak { streak, max } => write!(
                f,
                "Loss streak circuit breaker tripped ({streak} consecutive losses >= {max})"
            ),
            Denial::MissingStopLoss => f.write_str("Stop loss is required"),
            Denial::MissingTakeProfit => f.write_str("Take profit is required"),
            Denial::ProtectiveLevelsInverted { direction } => match direction {
                Direction::Long => f.write_str("Long trade requires stop < entry < take profit"),
                Direction::Short => f.write_str("Short trade requires take profit < entry < stop"),
            },
            Denial::RiskRewardTooLow { ratio, min } => {
                write!(f, "Risk:reward too low ({ratio:.2} < {min:.2})")
            }
            Denial::Sizing { detail } => write!(f, "Position sizing failed: {detail}"),
        }
    }
}

/// Result of a full trade validation. Only a valid check carries a nonzero
/// size.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeCheck {
    pub is_valid: bool,
    pub reason: Option<Denial>,
    pub position_size: u64,
}

impl TradeCheck {
    fn denied(reason: Denial) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            position_size: 0,
        }
    }
}

/// Price levels of a proposed trade.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TradeRequest {
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Progress against an FTMO-style challenge. Advisory only.
#[derive(Clone, Debug, PartialEq)]
pub enum ChallengeStatus {
    InProgress { profit_pct: f64, trading_days: u32 },
    TargetReached { profit_pct: f64, trading_days: u32 },
    Breached(Denial),
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Drawdown-aware admission control for one account under one policy.
///
/// Holds limits only; every check is a pure function of its arguments, so
/// calling any of them repeatedly on the same state gives the same answer.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskGate {
    limits: AccountLimits,
    max_daily_trades: u32,
    max_concurrent_positions: u32,
    max_risk_per_trade: f64,
    min_risk_reward: f64,
}

impl RiskGate {
    pub fn new(limits: AccountLimits, policy: &RiskPolicy) -> Self {
        Self {
            limits,
            max_daily_trades: policy.limits.max_trades_per_day,
            max_concurrent_positions: policy.limits.max_concurrent_positions,
            max_risk_per_trade: policy.risk.max_risk_per_trade,
            min_risk_reward: policy.risk.min_risk_reward,
        }
    }

    pub fn limits(&self) -> &AccountLimits {
        &self.limits
    }

    pub fn max_risk_per_trade(&self) -> f64 {
        self.max_risk_per_trade
    }

    /// Admission checks in fixed order; the first failure wins.
    pub fn can_trade(&self, state: &AccountState, open_positions: usize) -> Admission {
        if !(state.daily_start_balance > 0.0 && state.peak_balance > 0.0) {
            return Admission::Denied(Denial::InvalidAccountState {
                detail: format!(
                    "reference balances must be positive (daily start {}, peak {})",
                    state.daily_start_balance, state.peak_balance
                ),
            });
        }
        if !state.current_balance.is_finite() {
            return Admission::Denied(Denial::InvalidAccountState {
                detail: "current balance is not finite".to_string(),
            });
        }

        let daily = state.daily_drawdown();
        if daily >= self.limits.max_daily_drawdown {
            return Admission::Denied(Denial::DailyDrawdown {
                drawdown: daily,
                limit: self.limits.max_daily_drawdown,
            });
        }

        let total = state.total_drawdown();
        if total >= self.limits.max_total_drawdown {
            return Admission::Denied(Denial::TotalDrawdown {
                drawdown: total,
                limit: self.limits.max_total_drawdown,
            });
        }

        if state.trades_today >= self.max_daily_trades {
            return Admission::Denied(Denial::DailyTradeLimit {
                trades: state.trades_today,
                max: self.max_daily_trades,
            });
        }

        if open_positions >= self.max_concurrent_positions as usize {
            return Admission::Denied(Denial::MaxConcurrentPositions {
                open: open_positions,
                max: self.max_concurrent_positions,
            });
        }

        if state.consecutive_losses >= self.limits.loss_streak_circuit_breaker {
            return Admission::Denied(Denial::LossStreak {
                streak: state.consecutive_losses,
                max: self.limits.loss_streak_circuit_breaker,
            });
        }

        Admission::Allowed
    }

    /// Units risking `balance * max_risk_per_trade` between `entry` and
    /// `stop`, rounded down to the contract lot step and clamped up to the
    /// contract minimum.
    pub fn calculate_position_size(
        &self,
        balance: f64,
        entry: f64,
        stop: f64,
        contract: ContractSpec,
    ) -> Result<u64, RiskError> {
        for (field, value) in [("balance", balance), ("entry", entry), ("stop", stop)] {
            if !value.is_finite() {
                return Err(RiskError::NonFiniteInput { field, value });
            }
        }
        if balance <= 0.0 {
            return Err(RiskError::NonPositiveBalance(balance));
        }
        let distance = (entry - stop).abs();
        if distance == 0.0 {
            return Err(RiskError::ZeroRiskDistance { entry, stop });
        }

        let risk_dollars = balance * self.max_risk_per_trade;
        let per_unit_loss = distance * contract.point_value;
        let raw = (risk_dollars / per_unit_loss).floor();
        let units = if raw >= u64::MAX as f64 { u64::MAX } else { raw as u64 };
        let step = contract.lot_step.max(1);
        Ok((units - units % step).max(contract.min_units))
    }

    /// Admission, protective-level sanity, reward:risk, then sizing.
    pub fn validate_trade(
        &self,
        state: &AccountState,
        request: &TradeRequest,
        contract: ContractSpec,
        open_positions: usize,
    ) -> TradeCheck {
        if let Admission::Denied(d) = self.can_trade(state, open_positions) {
            return TradeCheck::denied(d);
        }

        let TradeRequest {
            direction,
            entry,
            stop_loss,
            take_profit,
        } = *request;

        let ordered = match direction {
            Direction::Long => stop_loss < entry && entry < take_profit,
            Direction::Short => take_profit < entry && entry < stop_loss,
        };
        if !ordered {
            return TradeCheck::denied(Denial::ProtectiveLevelsInverted { direction });
        }

        let risk = (entry - stop_loss).abs();
        let reward = (take_profit - entry).abs();
        let ratio = reward / risk;
        if ratio < self.min_risk_reward {
            return TradeCheck::denied(Denial::RiskRewardTooLow {
                ratio,
                min: self.min_risk_reward,
            });
        }

        match self.calculate_position_size(state.current_balance, entry, stop_loss, contract) {
            Ok(units) if units > 0 => TradeCheck {
                is_valid: true,
                reason: None,
                position_size: units,
            },
            Ok(_) => TradeCheck::denied(Denial::Sizing {
                detail: "computed size is zero".to_string(),
            }),
            Err(e) => {
                tracing::error!(account_id = %state.account_id, error = %e, "position sizing failed");
                TradeCheck::denied(Denial::Sizing {
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Current daily drawdown if it has reached the account cap.
    pub fn daily_drawdown_breached(&self, state: &AccountState) -> Option<f64> {
        let dd = state.daily_drawdown();
        (dd >= self.limits.max_daily_drawdown).then_some(dd)
    }

    pub fn challenge_status(&self, state: &AccountState) -> ChallengeStatus {
        let daily = state.daily_drawdown();
        if daily >= self.limits.max_daily_drawdown {
            return ChallengeStatus::Breached(Denial::DailyDrawdown {
                drawdown: daily,
                limit: self.limits.max_daily_drawdown,
            });
        }
        let total = state.total_drawdown();
        if total >= self.limits.max_total_drawdown {
            return ChallengeStatus::Breached(Denial::TotalDrawdown {
                drawdown: total,
                limit: self.limits.max_total_drawdown,
            });
        }

        let profit_pct = state.profit_pct();
        let trading_days = state.trading_days;
        let target_met = self.limits.profit_target.is_some_and(|t| profit_pct >= t);
        let days_met = self
            .limits
            .min_trading_days
            .map_or(true, |d| trading_days >= d);
        if target_met && days_met {
            ChallengeStatus::TargetReached {
                profit_pct,
                trading_days,
            }
        } else {
            ChallengeStatus::InProgress {
                profit_pct,
                trading_days,
            }
        }
    }
}

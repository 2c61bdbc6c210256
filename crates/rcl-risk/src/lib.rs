//! rcl-risk
//!
//! Account-level risk control:
//! - [`AccountState`]: drawdown and streak bookkeeping folded from trade events
//! - [`RiskGate`]: drawdown-aware admission control and position sizing
//! - [`TradeValidator`]: declarative mandate rules for restricted accounts
//! - [`check_for_emotional_trading`]: advisory rationale screen
//!
//! Pure logic. No IO, no clock reads, no broker calls.

mod account;
mod emotional;
mod error;
mod gate;
mod mandate;

pub use account::AccountState;
pub use emotional::{check_for_emotional_trading, EmotionalCheck, EMOTIONAL_TERMS};
pub use error::RiskError;
pub use gate::{Admission, ChallengeStatus, Denial, RiskGate, TradeCheck, TradeRequest};
pub use mandate::{MandateRejection, MandateRequest, MandateVerdict, TradeValidator};

pub use rcl_config::AccountLimits;

//! rcl-runtime
//!
//! Wires the pure control crates into one polling loop per account:
//! protection and close detection first, then at most one new candidate
//! through quality, policy, mandate and risk checks, then a single order
//! submission through the broker gateway.

mod account_loop;
mod decision;
mod error;
mod fleet;
mod signal;

pub use account_loop::{AccountLoop, LoopContext};
pub use decision::{CandidateOutcome, DenialReason, TickReport};
pub use error::RuntimeError;
pub use fleet::Fleet;
pub use signal::{ChannelSignalSource, NoSignals, SignalSource};

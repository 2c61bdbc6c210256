use rcl_protect::StopUpdate;
use rcl_risk::{Denial, MandateRejection};
use rcl_schemas::Quote;
use std::fmt;

/// Why a candidate did not become an order. `Display` is what goes into
/// `TradeDenied.reason`.
#[derive(Clone, Debug, PartialEq)]
pub enum DenialReason {
    WrongAccount { expected: String, got: String },
    WrongInstrument { expected: String, got: String },
    Quality { passed: usize, required: usize, summary: String },
    PolicyUnavailable(String),
    PolicyDisabled(String),
    Mandate(MandateRejection),
    Risk(Denial),
    AccountStateUnavailable(String),
    /// Confirmed fills are still missing from the ledger.
    EntriesUnrecorded(usize),
    BrokerRejected(String),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::WrongAccount { expected, got } => {
                write!(f, "Candidate for account {got} routed to {expected}")
            }
            DenialReason::WrongInstrument { expected, got } => {
                write!(f, "Account trades only {expected} (got {got})")
            }
            DenialReason::Quality {
                passed,
                required,
                summary,
            } => write!(f, "Signal quality too low ({passed}/{required} checks): {summary}"),
            DenialReason::PolicyUnavailable(name) => write!(f, "Risk policy {name} is not configured"),
            DenialReason::PolicyDisabled(name) => write!(f, "Risk policy {name} is disabled"),
            DenialReason::Mandate(r) => write!(f, "{r}"),
            DenialReason::Risk(d) => write!(f, "{d}"),
            DenialReason::AccountStateUnavailable(detail) => {
                write!(f, "Account state unavailable: {detail}")
            }
            DenialReason::EntriesUnrecorded(n) => {
                write!(f, "New entries paused: {n} filled trade(s) not yet recorded in the ledger")
            }
            DenialReason::BrokerRejected(reason) => write!(f, "Broker rejected order: {reason}"),
        }
    }
}

/// What became of the candidate pulled in one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum CandidateOutcome {
    Denied(DenialReason),
    Opened { trade_id: String, units: u64, fill_price: f64 },
    /// Submitted, outcome unknown. Never resubmitted.
    Unknown { client_order_id: String, detail: String },
}

/// Everything one tick did. Mostly for tests and tracing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub quote: Option<Quote>,
    pub stops_moved: Vec<StopUpdate>,
    pub closed: Vec<String>,
    pub candidate: Option<CandidateOutcome>,
}

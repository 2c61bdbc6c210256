use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskError {
    /// Entry and stop are the same price; no finite size exists.
    #[error("zero risk distance: entry {entry} equals stop {stop}")]
    ZeroRiskDistance { entry: f64, stop: f64 },

    #[error("non-finite sizing input ({field} = {value})")]
    NonFiniteInput { field: &'static str, value: f64 },

    #[error("balance must be positive to size a trade (got {0})")]
    NonPositiveBalance(f64),
}

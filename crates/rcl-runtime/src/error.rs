use rcl_execution::BrokerError;
use rcl_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("account {account_id} trades under unknown policy {policy}")]
    UnknownPolicy { account_id: String, policy: String },
}

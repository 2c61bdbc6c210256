use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// An exit was recorded for a trade with no committed open entry.
    #[error("exit for trade {trade_id} has no committed open entry")]
    ExitWithoutEntry { trade_id: String },

    #[error("trade {trade_id} is not open")]
    TradeNotOpen { trade_id: String },

    #[error("trade {trade_id} already recorded")]
    DuplicateTrade { trade_id: String },

    #[error("unknown account {0}")]
    UnknownAccount(String),

    #[error("corrupt {table} row: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    #[error("ledger database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("ledger migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    pub(crate) fn corrupt(table: &'static str, detail: impl Into<String>) -> Self {
        LedgerError::CorruptRow {
            table,
            detail: detail.into(),
        }
    }
}

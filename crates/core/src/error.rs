use thiserror::Error;

use crate::types::TradeRecord;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Invalid trade intent: {0}")]
    InvalidIntent(String),

    /// The trade resolved but its ledger row could not be written. The
    /// resolved record is carried along so the caller still sees the outcome.
    #[error("Failed to record {} trade on {} in ledger: {source}", .record.status, .record.market_slug)]
    LedgerWrite {
        record: Box<TradeRecord>,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

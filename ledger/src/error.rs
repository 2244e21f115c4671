use commitclub_types::CommitId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid commitment parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("commitment {0} not found")]
    NotFound(CommitId),

    #[error("storage error: {0}")]
    Storage(#[from] commitclub_store::StoreError),
}

use crate::file::TransactionId;
use crate::record::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Operator is not open")]
    NotOpen,

    #[error("No more rows")]
    Exhausted,

    #[error("Expected {expected} child operators, got {actual}")]
    ChildCount { expected: usize, actual: usize },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unsupported aggregate: {0}")]
    UnsupportedAggregate(String),

    #[error("Invalid group-by type: {0}")]
    InvalidGroupType(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),

    #[error("Record error: {0}")]
    Record(RecordError),
}

impl ExecError {
    pub fn is_transaction_abort(&self) -> bool {
        matches!(self, ExecError::TransactionAborted(_))
    }
}

// Aborts are lifted to the top level so every operator layer sees the same
// variant no matter how deep the failure started.
impl From<RecordError> for ExecError {
    fn from(err: RecordError) -> Self {
        match err.aborted_transaction() {
            Some(txn) => ExecError::TransactionAborted(txn),
            None => ExecError::Record(err),
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;

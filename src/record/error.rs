use crate::file::{FileError, TableId, TransactionId};
use thiserror::Error;

use super::record::SlotId;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Schema must have at least one field")]
    EmptySchema,

    #[error("Field index {index} out of range for schema with {num_fields} fields")]
    FieldIndexOutOfRange { index: usize, num_fields: usize },

    #[error("No field named '{0}'")]
    FieldNotFound(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Invalid slot: {0}")]
    InvalidSlot(SlotId),

    #[error("Page full")]
    PageFull,

    #[error("Slot {0} is already empty")]
    SlotEmpty(SlotId),

    #[error("Record has no record id")]
    MissingRecordId,

    #[error("Record belongs to table {actual}, not table {expected}")]
    ForeignRecord { expected: TableId, actual: TableId },

    #[error("Record of {record_size} bytes does not fit a {page_size} byte page")]
    RecordTooLarge { record_size: usize, page_size: usize },

    #[error("Table not open: {0}")]
    TableNotOpen(TableId),

    #[error("Scan is not open")]
    ScanNotOpen,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl RecordError {
    /// True when the backing store failed, or handed back page bytes that
    /// cannot be decoded
    pub fn is_storage_failure(&self) -> bool {
        match self {
            RecordError::File(e) => e.is_storage_failure(),
            RecordError::Deserialization(_) => true,
            _ => false,
        }
    }

    /// The transaction whose abort caused this error, if any
    pub fn aborted_transaction(&self) -> Option<TransactionId> {
        match self {
            RecordError::File(FileError::TransactionAborted(txn)) => Some(*txn),
            _ => None,
        }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

use std::io;
use thiserror::Error;

use super::{PageNo, TableId, TransactionId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid file handle: {0}")]
    InvalidHandle(usize),

    #[error("No table registered with id {0}")]
    UnknownTable(TableId),

    #[error("Page not found: table_id={table_id}, page_no={page_no}")]
    PageNotFound { table_id: TableId, page_no: PageNo },

    #[error("Buffer pool is full of uncommitted pages")]
    BufferPoolFull,

    #[error("Short page read: page_no={page_no}, only {available} bytes left")]
    ShortPage { page_no: PageNo, available: usize },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("File handle limit reached")]
    TooManyOpenFiles,

    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),
}

impl FileError {
    /// True for failures of the backing store itself (as opposed to
    /// bookkeeping errors such as an unknown handle)
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, FileError::Io(_) | FileError::ShortPage { .. })
    }
}

pub type FileResult<T> = Result<T, FileError>;

mod buffer_manager;
mod error;
mod file_manager;
mod transaction;

pub use buffer_manager::BufferManager;
pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, PagedFileManager, table_id_for_path};
pub use transaction::{Permissions, TransactionId};

use std::fmt;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Number of pages in the buffer pool
/// 1000 pages × 4KB = 4MB of cached table data
pub const BUFFER_POOL_SIZE: usize = 1000;

/// Stable identifier of a heap file, derived from its canonical path
pub type TableId = u32;

/// Zero-based page number inside one file
pub type PageNo = usize;

/// Identity of one page: which file, and where in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

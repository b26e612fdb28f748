mod error;
mod heap_file;
mod page;
mod record;
mod schema;
mod value;


pub use error::{RecordError, RecordResult};
pub use heap_file::{HeapFile, HeapFileScan};
pub use page::{Page, PageHeader};
pub use record::{Record, RecordId, SlotId};
pub use schema::{ColumnDef, RowSchema};
pub use value::{DataType, Value};

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;

use crate::file::{BufferManager, PageId, TableId, TransactionId};

/// Registry of open heap files on top of a shared buffer manager.
///
/// This is the entry point the execution layer uses to reach storage:
/// rows are routed to the heap file that owns them by table id.
pub struct RecordManager {
    buffer_manager: Arc<Mutex<BufferManager>>,
    tables: RwLock<AHashMap<TableId, HeapFile>>,
}

impl RecordManager {
    /// Create a new record manager
    pub fn new(buffer_manager: Arc<Mutex<BufferManager>>) -> Self {
        Self {
            buffer_manager,
            tables: RwLock::new(AHashMap::new()),
        }
    }

    pub fn buffer_manager(&self) -> Arc<Mutex<BufferManager>> {
        Arc::clone(&self.buffer_manager)
    }

    pub fn page_size(&self) -> usize {
        self.buffer_manager.lock().page_size()
    }

    /// Create a new heap file and register it
    pub fn create_table<P: AsRef<Path>>(&self, path: P, schema: RowSchema) -> RecordResult<TableId> {
        let file = {
            let mut buffer_manager = self.buffer_manager.lock();
            HeapFile::create(buffer_manager.file_manager_mut(), path, schema)?
        };
        Ok(self.register(file))
    }

    /// Open an existing heap file and register it.
    /// Opening a file that is already registered returns its id.
    pub fn open_table<P: AsRef<Path>>(&self, path: P, schema: RowSchema) -> RecordResult<TableId> {
        let file = {
            let mut buffer_manager = self.buffer_manager.lock();
            HeapFile::open(buffer_manager.file_manager_mut(), path, schema)?
        };
        if self.tables.read().contains_key(&file.table_id()) {
            return Ok(file.table_id());
        }
        Ok(self.register(file))
    }

    /// Register an already opened heap file
    pub fn register(&self, file: HeapFile) -> TableId {
        let table_id = file.table_id();
        self.tables.write().insert(table_id, file);
        table_id
    }

    /// Forget a table; its file stays open in the file manager
    pub fn close_table(&self, table_id: TableId) -> RecordResult<()> {
        self.tables
            .write()
            .remove(&table_id)
            .map(|_| ())
            .ok_or(RecordError::TableNotOpen(table_id))
    }

    pub fn table(&self, table_id: TableId) -> RecordResult<HeapFile> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(RecordError::TableNotOpen(table_id))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().keys().copied().collect()
    }

    /// Insert a row into a table; the row receives its record id
    pub fn insert_row(
        &self,
        txn: TransactionId,
        table_id: TableId,
        record: &mut Record,
    ) -> RecordResult<Vec<PageId>> {
        let table = self.table(table_id)?;
        let mut buffer_manager = self.buffer_manager.lock();
        table.insert_row(&mut buffer_manager, txn, record)
    }

    /// Delete a row from the table its record id points into
    pub fn delete_row(&self, txn: TransactionId, record: &Record) -> RecordResult<Vec<PageId>> {
        let rid = record.rid().ok_or(RecordError::MissingRecordId)?;
        let table = self.table(rid.table_id())?;
        let mut buffer_manager = self.buffer_manager.lock();
        table.delete_row(&mut buffer_manager, txn, record)
    }

    /// Lazy scan over a table's rows
    pub fn scan(&self, txn: TransactionId, table_id: TableId) -> RecordResult<HeapFileScan> {
        Ok(self.table(table_id)?.scan(self.buffer_manager(), txn))
    }

    pub fn commit(&self, txn: TransactionId) -> RecordResult<()> {
        self.buffer_manager.lock().commit(txn)?;
        Ok(())
    }

    pub fn abort(&self, txn: TransactionId) {
        self.buffer_manager.lock().abort(txn);
    }
}

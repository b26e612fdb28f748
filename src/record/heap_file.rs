use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use super::error::{RecordError, RecordResult};
use super::page::Page;
use super::record::Record;
use super::schema::RowSchema;
use crate::file::{
    BufferManager, FileError, FileHandle, PAGE_SIZE, PageId, PageNo, PagedFileManager, TableId,
    TransactionId,
};

/// A table stored as a flat file of fixed-size slotted pages.
///
/// The heap file itself only knows where the file is, what its rows look
/// like and which table id it answers to. Page contents live in the
/// buffer manager.
#[derive(Debug, Clone)]
pub struct HeapFile {
    handle: FileHandle,
    table_id: TableId,
    schema: RowSchema,
}

impl HeapFile {
    /// Create a new, empty heap file
    pub fn create<P: AsRef<Path>>(
        file_manager: &mut PagedFileManager,
        path: P,
        schema: RowSchema,
    ) -> RecordResult<Self> {
        file_manager.create_file(path.as_ref())?;
        Self::open(file_manager, path, schema)
    }

    /// Open an existing heap file
    pub fn open<P: AsRef<Path>>(
        file_manager: &mut PagedFileManager,
        path: P,
        schema: RowSchema,
    ) -> RecordResult<Self> {
        if Page::calculate_slot_count(schema.record_size()) == 0 {
            return Err(RecordError::RecordTooLarge {
                record_size: schema.record_size(),
                page_size: PAGE_SIZE,
            });
        }

        let handle = file_manager.open_file(path)?;
        let table_id = file_manager.table_id(handle)?;

        Ok(Self {
            handle,
            table_id,
            schema,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Number of complete pages currently in the file
    pub fn page_count(&self, file_manager: &PagedFileManager) -> RecordResult<usize> {
        Ok(file_manager.get_page_count(self.handle)?)
    }

    /// Read one page straight from the file
    pub fn read_page(
        &self,
        file_manager: &mut PagedFileManager,
        page_no: PageNo,
    ) -> RecordResult<Vec<u8>> {
        let mut buffer = vec![0u8; PAGE_SIZE];
        file_manager.read_page(self.handle, page_no, &mut buffer)?;
        Ok(buffer)
    }

    /// Write one page straight to the file and wait for it to reach disk
    pub fn write_page(
        &self,
        file_manager: &mut PagedFileManager,
        page_no: PageNo,
        bytes: &[u8],
    ) -> RecordResult<()> {
        file_manager.write_page(self.handle, page_no, bytes)?;
        file_manager.sync_file(self.handle)?;
        Ok(())
    }

    /// Insert a row into the first page with a free slot.
    ///
    /// Existing pages are tried in order. When all are full a new page is
    /// formatted, the row placed on it and the page written directly to
    /// the file. Returns the pages that were modified. On success the row
    /// carries its new record id.
    pub fn insert_row(
        &self,
        buffer_mgr: &mut BufferManager,
        txn: TransactionId,
        record: &mut Record,
    ) -> RecordResult<Vec<PageId>> {
        buffer_mgr.ensure_active(txn)?;
        self.schema.validate_record(record.values())?;
        let record_size = self.schema.record_size();

        let page_count = self.page_count(buffer_mgr.file_manager())?;
        for page_no in 0..page_count {
            let page_id = PageId::new(self.table_id, page_no);

            let has_room = {
                let page = Page::from_buffer(buffer_mgr.get_page(txn, page_id)?, record_size)?;
                page.free_slot_count() > 0
            };
            if !has_room {
                continue;
            }

            let buffer = buffer_mgr.get_page_mut(txn, page_id)?;
            let mut page = Page::from_buffer(buffer, record_size)?;
            page.insert_record(page_id, record, &self.schema)?;
            return Ok(vec![page_id]);
        }

        let page_id = PageId::new(self.table_id, page_count);
        let mut bytes = Page::empty_page_bytes(record_size)?;
        Page::from_buffer(&mut bytes[..], record_size)?.insert_record(
            page_id,
            record,
            &self.schema,
        )?;
        self.write_page(buffer_mgr.file_manager_mut(), page_count, &bytes)?;
        log::debug!("appended page {} to table {}", page_count, self.table_id);

        Ok(vec![page_id])
    }

    /// Remove a row previously read from or inserted into this file.
    /// Returns the page that was modified.
    pub fn delete_row(
        &self,
        buffer_mgr: &mut BufferManager,
        txn: TransactionId,
        record: &Record,
    ) -> RecordResult<Vec<PageId>> {
        buffer_mgr.ensure_active(txn)?;
        let rid = record.rid().ok_or(RecordError::MissingRecordId)?;
        if rid.table_id() != self.table_id {
            return Err(RecordError::ForeignRecord {
                expected: self.table_id,
                actual: rid.table_id(),
            });
        }

        let page_id = rid.page_id;
        if page_id.page_no >= self.page_count(buffer_mgr.file_manager())? {
            return Err(FileError::PageNotFound {
                table_id: page_id.table_id,
                page_no: page_id.page_no,
            }
            .into());
        }

        let buffer = buffer_mgr.get_page_mut(txn, page_id)?;
        let mut page = Page::from_buffer(buffer, self.schema.record_size())?;
        page.delete_record(record)?;

        Ok(vec![page_id])
    }

    /// Lazy scan over every row in the file
    pub fn scan(
        &self,
        buffer_manager: Arc<Mutex<BufferManager>>,
        txn: TransactionId,
    ) -> HeapFileScan {
        HeapFileScan::new(self, buffer_manager, txn)
    }
}

/// Page-at-a-time cursor over a heap file.
///
/// The page count is fixed when the scan is opened; pages appended later
/// are not visited. Rows of the current page are decoded once when the
/// cursor reaches it, so the buffer manager is locked once per page.
pub struct HeapFileScan {
    handle: FileHandle,
    table_id: TableId,
    schema: RowSchema,
    buffer_manager: Arc<Mutex<BufferManager>>,
    txn: TransactionId,
    page_count: usize,
    page_no: PageNo,
    rows: std::vec::IntoIter<Record>,
    open: bool,
}

impl HeapFileScan {
    fn new(
        file: &HeapFile,
        buffer_manager: Arc<Mutex<BufferManager>>,
        txn: TransactionId,
    ) -> Self {
        Self {
            handle: file.handle,
            table_id: file.table_id,
            schema: file.schema.clone(),
            buffer_manager,
            txn,
            page_count: 0,
            page_no: 0,
            rows: Vec::new().into_iter(),
            open: false,
        }
    }

    pub fn schema(&self) -> &RowSchema {
        &self.schema
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Position the cursor at the first row of page 0
    pub fn open(&mut self) -> RecordResult<()> {
        self.page_count = self
            .buffer_manager
            .lock()
            .file_manager()
            .get_page_count(self.handle)?;
        self.page_no = 0;
        self.rows = if self.page_count > 0 {
            self.load_page(0)?
        } else {
            Vec::new().into_iter()
        };
        self.open = true;
        Ok(())
    }

    /// Next row, or `None` once every page has been visited
    pub fn next(&mut self) -> RecordResult<Option<Record>> {
        if !self.open {
            return Err(RecordError::ScanNotOpen);
        }

        loop {
            if let Some(record) = self.rows.next() {
                return Ok(Some(record));
            }
            if self.page_no + 1 >= self.page_count {
                return Ok(None);
            }
            self.page_no += 1;
            self.rows = self.load_page(self.page_no)?;
        }
    }

    pub fn rewind(&mut self) -> RecordResult<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.rows = Vec::new().into_iter();
        self.open = false;
    }

    fn load_page(&self, page_no: PageNo) -> RecordResult<std::vec::IntoIter<Record>> {
        let page_id = PageId::new(self.table_id, page_no);
        let mut buffer_manager = self.buffer_manager.lock();
        let page = Page::from_buffer(
            buffer_manager.get_page(self.txn, page_id)?,
            self.schema.record_size(),
        )?;
        let rows = page
            .records(page_id, &self.schema)
            .collect::<RecordResult<Vec<_>>>()?;
        Ok(rows.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ColumnDef, DataType, Value};
    use tempfile::TempDir;

    fn create_test_schema() -> RowSchema {
        RowSchema::new(vec![
            ColumnDef::new("id", DataType::Int),
            ColumnDef::new("name", DataType::Char(20)),
            ColumnDef::new("score", DataType::Float),
        ])
        .unwrap()
    }

    fn row(i: i32) -> Record {
        Record::new(vec![
            Value::Int(i),
            Value::String(format!("User{}", i)),
            Value::Float(i as f64 * 10.0),
        ])
    }

    fn setup_test_env() -> (TempDir, Arc<Mutex<BufferManager>>, HeapFile) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut file_manager = PagedFileManager::new();
        let file = HeapFile::create(
            &mut file_manager,
            temp_dir.path().join("test.tbl"),
            create_test_schema(),
        )
        .unwrap();
        let buffer_manager = Arc::new(Mutex::new(BufferManager::new(file_manager)));
        (temp_dir, buffer_manager, file)
    }

    fn scan_all(file: &HeapFile, bm: &Arc<Mutex<BufferManager>>, txn: TransactionId) -> Vec<Record> {
        let mut scan = file.scan(Arc::clone(bm), txn);
        scan.open().unwrap();
        let mut rows = Vec::new();
        while let Some(record) = scan.next().unwrap() {
            rows.push(record);
        }
        rows
    }

    #[test]
    fn test_create_heap_file() {
        let (_temp_dir, bm, file) = setup_test_env();
        assert_eq!(file.page_count(bm.lock().file_manager()).unwrap(), 0);
        assert_eq!(file.schema(), &create_test_schema());
    }

    #[test]
    fn test_table_id_stable_across_opens() {
        let (temp_dir, _bm, file) = setup_test_env();
        let mut other = PagedFileManager::new();
        let reopened =
            HeapFile::open(&mut other, temp_dir.path().join("test.tbl"), create_test_schema())
                .unwrap();
        assert_eq!(file.table_id(), reopened.table_id());
    }

    #[test]
    fn test_insert_then_scan() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();

        for i in 0..10 {
            let mut record = row(i);
            let dirtied = file.insert_row(&mut bm.lock(), txn, &mut record).unwrap();
            assert_eq!(dirtied.len(), 1);
            assert_eq!(record.rid().unwrap().table_id(), file.table_id());
        }

        let rows = scan_all(&file, &bm, txn);
        assert_eq!(rows.len(), 10);
        for (i, record) in rows.iter().enumerate() {
            assert_eq!(record.values(), row(i as i32).values());
            assert_eq!(record.rid().unwrap().table_id(), file.table_id());
        }
    }

    #[test]
    fn test_page_fill_policy() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();
        let per_page = Page::calculate_slot_count(file.schema().record_size());

        for i in 0..=per_page {
            let mut record = row(i as i32);
            let dirtied = file.insert_row(&mut bm.lock(), txn, &mut record).unwrap();
            let expected_page = if i < per_page { 0 } else { 1 };
            assert_eq!(dirtied, vec![PageId::new(file.table_id(), expected_page)]);
        }

        let mut bm = bm.lock();
        assert_eq!(file.page_count(bm.file_manager()).unwrap(), 2);
        let first = bm.get_page(txn, PageId::new(file.table_id(), 0)).unwrap();
        let page = Page::from_buffer(first, file.schema().record_size()).unwrap();
        assert_eq!(page.free_slot_count(), 0);
    }

    #[test]
    fn test_insert_reuses_freed_slot() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();
        let per_page = Page::calculate_slot_count(file.schema().record_size());

        let mut rows: Vec<Record> = (0..per_page as i32 + 1).map(row).collect();
        for record in rows.iter_mut() {
            file.insert_row(&mut bm.lock(), txn, record).unwrap();
        }

        file.delete_row(&mut bm.lock(), txn, &rows[3]).unwrap();
        let mut again = row(-1);
        let dirtied = file.insert_row(&mut bm.lock(), txn, &mut again).unwrap();
        assert_eq!(dirtied, vec![PageId::new(file.table_id(), 0)]);
        assert_eq!(again.rid(), rows[3].rid());
    }

    #[test]
    fn test_delete_row() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();

        for i in 0..5 {
            file.insert_row(&mut bm.lock(), txn, &mut row(i)).unwrap();
        }

        let rows = scan_all(&file, &bm, txn);
        let victim = rows[2].clone();
        let dirtied = file.delete_row(&mut bm.lock(), txn, &victim).unwrap();
        assert_eq!(dirtied, vec![victim.rid().unwrap().page_id]);

        let rows = scan_all(&file, &bm, txn);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.rid() != victim.rid()));

        // Deleting twice hits an empty slot
        let result = file.delete_row(&mut bm.lock(), txn, &victim);
        assert!(matches!(result, Err(RecordError::SlotEmpty(_))));
    }

    #[test]
    fn test_delete_requires_matching_table() {
        let (temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();

        let other = {
            let mut bm = bm.lock();
            HeapFile::create(
                bm.file_manager_mut(),
                temp_dir.path().join("other.tbl"),
                create_test_schema(),
            )
            .unwrap()
        };
        let mut foreign = row(1);
        other.insert_row(&mut bm.lock(), txn, &mut foreign).unwrap();

        let result = file.delete_row(&mut bm.lock(), txn, &foreign);
        assert!(matches!(result, Err(RecordError::ForeignRecord { .. })));

        let result = file.delete_row(&mut bm.lock(), txn, &row(2));
        assert!(matches!(result, Err(RecordError::MissingRecordId)));
    }

    #[test]
    fn test_insert_rejects_wrong_shape() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();

        let mut record = Record::new(vec![Value::Int(1)]);
        let result = file.insert_row(&mut bm.lock(), txn, &mut record);
        assert!(matches!(result, Err(RecordError::SchemaMismatch(_))));
        assert!(record.rid().is_none());
    }

    #[test]
    fn test_schema_too_wide_for_page() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut file_manager = PagedFileManager::new();
        let schema = RowSchema::from_types(&[DataType::Char(PAGE_SIZE)]).unwrap();
        let result = HeapFile::create(&mut file_manager, temp_dir.path().join("wide.tbl"), schema);
        assert!(matches!(result, Err(RecordError::RecordTooLarge { .. })));
    }

    #[test]
    fn test_read_write_page() {
        let (_temp_dir, bm, file) = setup_test_env();
        let mut bm = bm.lock();

        let bytes = Page::empty_page_bytes(file.schema().record_size()).unwrap();
        file.write_page(bm.file_manager_mut(), 0, &bytes).unwrap();
        assert_eq!(file.page_count(bm.file_manager()).unwrap(), 1);
        assert_eq!(file.read_page(bm.file_manager_mut(), 0).unwrap(), bytes);

        let result = file.read_page(bm.file_manager_mut(), 1);
        assert!(matches!(
            result,
            Err(RecordError::File(FileError::ShortPage { .. }))
        ));
    }

    #[test]
    fn test_scan_skips_empty_pages_and_rewinds() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();
        let per_page = Page::calculate_slot_count(file.schema().record_size());

        // Three pages; empty the middle one
        let mut rows: Vec<Record> = (0..(per_page * 2 + 1) as i32).map(row).collect();
        for record in rows.iter_mut() {
            file.insert_row(&mut bm.lock(), txn, record).unwrap();
        }
        for record in rows.iter().filter(|r| r.rid().unwrap().page_id.page_no == 1) {
            file.delete_row(&mut bm.lock(), txn, record).unwrap();
        }

        let mut scan = file.scan(Arc::clone(&bm), txn);
        assert!(matches!(scan.next(), Err(RecordError::ScanNotOpen)));

        scan.open().unwrap();
        let mut seen = 0;
        while let Some(record) = scan.next().unwrap() {
            assert_ne!(record.rid().unwrap().page_id.page_no, 1);
            seen += 1;
        }
        assert_eq!(seen, per_page + 1);
        assert!(scan.next().unwrap().is_none());

        scan.rewind().unwrap();
        let first = scan.next().unwrap().unwrap();
        assert_eq!(first.values(), row(0).values());

        scan.close();
        assert!(!scan.is_open());
    }

    #[test]
    fn test_scan_ignores_pages_appended_after_open() {
        let (_temp_dir, bm, file) = setup_test_env();
        let txn = TransactionId::new();

        let mut scan = file.scan(Arc::clone(&bm), txn);
        scan.open().unwrap();
        file.insert_row(&mut bm.lock(), txn, &mut row(1)).unwrap();
        assert!(scan.next().unwrap().is_none());

        scan.rewind().unwrap();
        assert!(scan.next().unwrap().is_some());
    }

    #[test]
    fn test_rows_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.tbl");
        let txn = TransactionId::new();

        {
            let mut file_manager = PagedFileManager::new();
            let file = HeapFile::create(&mut file_manager, &path, create_test_schema()).unwrap();
            let mut bm = BufferManager::new(file_manager);
            for i in 0..3 {
                file.insert_row(&mut bm, txn, &mut row(i)).unwrap();
            }
            bm.commit(txn).unwrap();
        }

        let mut file_manager = PagedFileManager::new();
        let file = HeapFile::open(&mut file_manager, &path, create_test_schema()).unwrap();
        let bm = Arc::new(Mutex::new(BufferManager::new(file_manager)));
        let rows = scan_all(&file, &bm, TransactionId::new());
        assert_eq!(rows.len(), 3);
    }
}

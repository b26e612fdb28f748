use ahash::{AHashMap, AHashSet};
use lru::LruCache;
use std::num::NonZeroUsize;

use super::error::{FileError, FileResult};
use super::file_manager::PagedFileManager;
use super::transaction::{Permissions, TransactionId};
use super::{BUFFER_POOL_SIZE, PAGE_SIZE, PageId};

/// Entry in the buffer pool
struct BufferEntry {
    /// The actual page data
    data: Vec<u8>,
    /// Transaction that last modified this page, if it is dirty
    dirtied_by: Option<TransactionId>,
}

/// Page cache with LRU eviction.
///
/// Every page access names the transaction it is made for. The manager keeps
/// track of which transactions have touched which pages and with what
/// permission, and which pages each transaction dirtied, so that commit can
/// flush and abort can discard exactly that transaction's work. Resolving
/// conflicting holders is left to a lock manager layered above.
///
/// Eviction never steals: only clean pages leave the pool on their own, so
/// nothing a transaction wrote reaches disk before it commits. Dirty pages
/// are written early only when a caller asks through `flush_page`,
/// `flush_all` or `evict_page`.
pub struct BufferManager {
    /// Underlying file manager
    file_manager: PagedFileManager,
    /// Combined buffer pool and LRU tracker
    buffer_pool: LruCache<PageId, BufferEntry>,
    /// Maximum size of the buffer pool
    max_pool_size: usize,
    /// Reusable buffer for loading pages (avoids allocation on every load)
    load_buffer: Vec<u8>,
    /// Permissions held per page, per transaction
    locks: AHashMap<PageId, AHashMap<TransactionId, Permissions>>,
    /// Transactions that were aborted and may not touch pages any more
    aborted: AHashSet<TransactionId>,
}

impl BufferManager {
    /// Create a new buffer manager
    pub fn new(file_manager: PagedFileManager) -> Self {
        Self::with_capacity(file_manager, BUFFER_POOL_SIZE)
    }

    /// Create a new buffer manager with specified capacity
    pub fn with_capacity(file_manager: PagedFileManager, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            file_manager,
            buffer_pool: LruCache::new(capacity),
            max_pool_size: capacity.get(),
            load_buffer: vec![0u8; PAGE_SIZE],
            locks: AHashMap::new(),
            aborted: AHashSet::new(),
        }
    }

    /// Size in bytes of every page this cache serves
    pub fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    /// Get a reference to the file manager
    pub fn file_manager(&self) -> &PagedFileManager {
        &self.file_manager
    }

    /// Get a mutable reference to the file manager
    pub fn file_manager_mut(&mut self) -> &mut PagedFileManager {
        &mut self.file_manager
    }

    /// Get a page for reading, loading it from disk if necessary
    pub fn get_page(&mut self, txn: TransactionId, page_id: PageId) -> FileResult<&[u8]> {
        self.acquire(txn, page_id, Permissions::ReadOnly)?;

        if self.buffer_pool.peek(&page_id).is_none() {
            self.load_page(page_id)?;
        }

        // get() also refreshes the LRU position
        self.buffer_pool
            .get(&page_id)
            .map(|entry| entry.data.as_slice())
            .ok_or(FileError::PageNotFound {
                table_id: page_id.table_id,
                page_no: page_id.page_no,
            })
    }

    /// Get a page for writing, loading it if necessary.
    /// The page is marked dirty on behalf of `txn`.
    pub fn get_page_mut(
        &mut self,
        txn: TransactionId,
        page_id: PageId,
    ) -> FileResult<&mut [u8]> {
        self.acquire(txn, page_id, Permissions::ReadWrite)?;

        if self.buffer_pool.peek(&page_id).is_none() {
            self.load_page(page_id)?;
        }

        let entry = self
            .buffer_pool
            .get_mut(&page_id)
            .ok_or(FileError::PageNotFound {
                table_id: page_id.table_id,
                page_no: page_id.page_no,
            })?;
        entry.dirtied_by = Some(txn);
        Ok(&mut entry.data)
    }

    /// Permission `txn` currently holds on a page, if any
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> Option<Permissions> {
        self.locks
            .get(&page_id)
            .and_then(|holders| holders.get(&txn))
            .copied()
    }

    /// Drop whatever permission `txn` holds on a page
    pub fn release_page(&mut self, txn: TransactionId, page_id: PageId) {
        if let Some(holders) = self.locks.get_mut(&page_id) {
            holders.remove(&txn);
            if holders.is_empty() {
                self.locks.remove(&page_id);
            }
        }
    }

    /// Write back every page dirtied by `txn` and release its permissions
    pub fn commit(&mut self, txn: TransactionId) -> FileResult<()> {
        self.flush_pages(txn)?;
        self.release_all(txn);
        log::info!("transaction {} committed", txn);
        Ok(())
    }

    /// Throw away every page dirtied by `txn` and refuse further page access
    /// on its behalf
    pub fn abort(&mut self, txn: TransactionId) {
        let dirty: Vec<PageId> = self
            .buffer_pool
            .iter()
            .filter(|(_, entry)| entry.dirtied_by == Some(txn))
            .map(|(key, _)| *key)
            .collect();

        for page_id in &dirty {
            self.buffer_pool.pop(page_id);
        }

        self.release_all(txn);
        self.aborted.insert(txn);
        log::info!(
            "transaction {} aborted, discarded {} dirty pages",
            txn,
            dirty.len()
        );
    }

    /// Whether `txn` has been aborted
    pub fn is_aborted(&self, txn: TransactionId) -> bool {
        self.aborted.contains(&txn)
    }

    /// Fail with `TransactionAborted` if `txn` may no longer touch pages
    pub fn ensure_active(&self, txn: TransactionId) -> FileResult<()> {
        if self.aborted.contains(&txn) {
            return Err(FileError::TransactionAborted(txn));
        }
        Ok(())
    }

    /// Flush a specific page to disk if it's dirty
    pub fn flush_page(&mut self, page_id: PageId) -> FileResult<()> {
        // Peek so flushing does not disturb the LRU order
        if let Some(entry) = self.buffer_pool.peek_mut(&page_id)
            && entry.dirtied_by.is_some()
        {
            let handle = self.file_manager.handle_for_table(page_id.table_id)?;
            self.file_manager
                .write_page(handle, page_id.page_no, &entry.data)?;
            entry.dirtied_by = None;
        }

        Ok(())
    }

    /// Flush the pages dirtied by one transaction
    pub fn flush_pages(&mut self, txn: TransactionId) -> FileResult<()> {
        let dirty: Vec<PageId> = self
            .buffer_pool
            .iter()
            .filter(|(_, entry)| entry.dirtied_by == Some(txn))
            .map(|(key, _)| *key)
            .collect();

        for page_id in dirty {
            self.flush_page(page_id)?;
        }

        self.file_manager.sync_all()?;
        Ok(())
    }

    /// Flush all dirty pages to disk, committed or not
    pub fn flush_all(&mut self) -> FileResult<()> {
        let dirty: Vec<PageId> = self
            .buffer_pool
            .iter()
            .filter(|(_, entry)| entry.dirtied_by.is_some())
            .map(|(key, _)| *key)
            .collect();

        for page_id in dirty {
            self.flush_page(page_id)?;
        }

        // Sync all files to ensure data is persisted to disk
        self.file_manager.sync_all()?;

        Ok(())
    }

    /// Remove a page from the buffer pool, writing it back first if dirty
    pub fn evict_page(&mut self, page_id: PageId) -> FileResult<()> {
        if self.buffer_pool.peek(&page_id).is_some() {
            self.flush_page(page_id)?;
            self.buffer_pool.pop(&page_id);
        }

        Ok(())
    }

    /// Remove a page from the buffer pool without writing it back
    pub fn discard_page(&mut self, page_id: PageId) {
        self.buffer_pool.pop(&page_id);
    }

    fn acquire(
        &mut self,
        txn: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> FileResult<()> {
        self.ensure_active(txn)?;

        let held = self
            .locks
            .entry(page_id)
            .or_default()
            .entry(txn)
            .or_insert(permissions);
        *held = held.upgrade(permissions);
        Ok(())
    }

    fn release_all(&mut self, txn: TransactionId) {
        self.locks.retain(|_, holders| {
            holders.remove(&txn);
            !holders.is_empty()
        });
    }

    /// Load a page from disk into the buffer pool
    fn load_page(&mut self, page_id: PageId) -> FileResult<()> {
        let handle = self.file_manager.handle_for_table(page_id.table_id)?;

        while self.buffer_pool.len() >= self.max_pool_size {
            self.evict_lru_page()?;
        }

        if self.load_buffer.len() != PAGE_SIZE {
            self.load_buffer = vec![0u8; PAGE_SIZE];
        }

        self.file_manager
            .read_page(handle, page_id.page_no, &mut self.load_buffer)?;

        // Move the loaded bytes into the pool; the next eviction hands a
        // buffer back for reuse
        let data = std::mem::take(&mut self.load_buffer);
        self.buffer_pool.put(
            page_id,
            BufferEntry {
                data,
                dirtied_by: None,
            },
        );

        Ok(())
    }

    /// Evict the least recently used clean page from the buffer pool
    fn evict_lru_page(&mut self) -> FileResult<()> {
        let victim = self
            .buffer_pool
            .iter()
            .rev()
            .find(|(_, entry)| entry.dirtied_by.is_none())
            .map(|(page_id, _)| *page_id)
            .ok_or(FileError::BufferPoolFull)?;

        if let Some(entry) = self.buffer_pool.pop(&victim) {
            log::debug!("evicted page {}", victim);
            self.load_buffer = entry.data;
        }

        Ok(())
    }

    /// Get the number of pages currently in the buffer pool
    pub fn buffer_pool_size(&self) -> usize {
        self.buffer_pool.len()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, page_id: PageId) -> bool {
        self.buffer_pool.contains(&page_id)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.buffer_pool
            .iter()
            .filter(|(_, e)| e.dirtied_by.is_some())
            .count()
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        // Committed pages are already on disk; whatever is still dirty
        // belongs to a transaction that never committed
        let uncommitted = self.dirty_page_count();
        if uncommitted > 0 {
            log::warn!(
                "dropping buffer manager with {} uncommitted dirty pages",
                uncommitted
            );
        }
    }
}

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::{PAGE_SIZE, PageNo, TableId};

/// Handle to an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

/// Derive the table id of a file from its canonical path.
///
/// The id is the CRC-32 of the path bytes, so every open of the same file
/// (in this process or another) yields the same id. Distinct paths can
/// collide; callers that need collision freedom must assign ids themselves.
pub fn table_id_for_path(canonical: &Path) -> TableId {
    crc32fast::hash(canonical.as_os_str().as_encoded_bytes())
}

/// Manages paged file operations
pub struct PagedFileManager {
    /// Map from file handles to open files
    open_files: HashMap<FileHandle, FileEntry>,
    /// Map from file paths to handles (for checking if already open)
    path_to_handle: HashMap<PathBuf, FileHandle>,
    /// Map from derived table ids to handles
    table_to_handle: HashMap<TableId, FileHandle>,
    /// Next available file handle
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
}

struct FileEntry {
    file: File,
    path: PathBuf,
    table_id: TableId,
}

impl PagedFileManager {
    /// Create a new paged file manager
    pub fn new() -> Self {
        Self::with_max_files(128)
    }

    /// Create a new paged file manager with specified max open files
    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: HashMap::new(),
            path_to_handle: HashMap::new(),
            table_to_handle: HashMap::new(),
            next_handle: 0,
            max_open_files,
        }
    }

    /// Create a new, empty file
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        File::create(path)?;
        Ok(())
    }

    /// Open an existing file
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        // Check if file is already open
        if let Some(&handle) = self.path_to_handle.get(&path) {
            return Ok(handle);
        }

        if self.open_files.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let table_id = table_id_for_path(&path);

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        self.open_files.insert(
            handle,
            FileEntry {
                file,
                path: path.clone(),
                table_id,
            },
        );
        self.path_to_handle.insert(path, handle);
        self.table_to_handle.insert(table_id, handle);

        Ok(handle)
    }

    /// Close a file
    pub fn close_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .remove(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        self.path_to_handle.remove(&entry.path);
        self.table_to_handle.remove(&entry.table_id);
        Ok(())
    }

    /// Remove (delete) a file
    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        // If file is open, close it first
        if let Ok(canonical_path) = path.canonicalize()
            && let Some(&handle) = self.path_to_handle.get(&canonical_path)
        {
            self.close_file(handle)?;
        }

        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Table id of an open file
    pub fn table_id(&self, handle: FileHandle) -> FileResult<TableId> {
        self.open_files
            .get(&handle)
            .map(|entry| entry.table_id)
            .ok_or(FileError::InvalidHandle(handle.0))
    }

    /// Canonical path of an open file
    pub fn path(&self, handle: FileHandle) -> FileResult<&Path> {
        self.open_files
            .get(&handle)
            .map(|entry| entry.path.as_path())
            .ok_or(FileError::InvalidHandle(handle.0))
    }

    /// Resolve the handle of an open file from its table id
    pub fn handle_for_table(&self, table_id: TableId) -> FileResult<FileHandle> {
        self.table_to_handle
            .get(&table_id)
            .copied()
            .ok_or(FileError::UnknownTable(table_id))
    }

    /// Read a page from a file.
    ///
    /// The page must lie entirely inside the file: a read that runs past the
    /// end is reported as `ShortPage` rather than padded.
    pub fn read_page(
        &mut self,
        handle: FileHandle,
        page_no: PageNo,
        buffer: &mut [u8],
    ) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let offset = (page_no * PAGE_SIZE) as u64;
        let file_size = entry.file.metadata()?.len();
        if file_size < offset + PAGE_SIZE as u64 {
            return Err(FileError::ShortPage {
                page_no,
                available: file_size.saturating_sub(offset) as usize,
            });
        }

        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.read_exact(buffer)?;

        Ok(())
    }

    /// Write a page to a file
    pub fn write_page(
        &mut self,
        handle: FileHandle,
        page_no: PageNo,
        buffer: &[u8],
    ) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let offset = (page_no * PAGE_SIZE) as u64;
        let required_size = offset + PAGE_SIZE as u64;

        // Extend file if necessary to ensure we can write at this offset
        let current_size = entry.file.metadata()?.len();
        if current_size < required_size {
            entry.file.set_len(required_size)?;
        }

        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.write_all(buffer)?;
        // Note: Don't sync on every write - callers that need durability
        // follow up with sync_file()

        Ok(())
    }

    /// Length of a file in bytes
    pub fn file_len(&self, handle: FileHandle) -> FileResult<u64> {
        let entry = self
            .open_files
            .get(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        Ok(entry.file.metadata()?.len())
    }

    /// Get the number of complete pages in a file
    pub fn get_page_count(&self, handle: FileHandle) -> FileResult<usize> {
        let file_size = self.file_len(handle)?;
        Ok((file_size / PAGE_SIZE as u64) as usize)
    }

    /// Sync a file to disk (flush all OS buffers)
    pub fn sync_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        entry.file.sync_data()?;
        Ok(())
    }

    /// Sync all open files to disk
    pub fn sync_all(&mut self) -> FileResult<()> {
        for entry in self.open_files.values_mut() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    /// Check if a file is open
    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    /// Get the number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }
}

impl Default for PagedFileManager {
    fn default() -> Self {
        Self::new()
    }
}

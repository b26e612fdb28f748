use super::error::{RecordError, RecordResult};
use super::record::{Record, RecordId, SlotId};
use super::schema::RowSchema;
use crate::file::{PAGE_SIZE, PageId};

/// Page header stored at the beginning of each page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub slot_count: u16,  // 2 bytes - Max slots in this page
    pub free_slots: u16,  // 2 bytes - Number of free slots
    pub record_size: u16, // 2 bytes - Size of each record
    _reserved: [u8; 10],  // 10 bytes - Padding to 16 bytes
}

impl PageHeader {
    pub const SIZE: usize = 16;

    pub fn new(slot_count: u16, record_size: u16) -> Self {
        Self {
            slot_count,
            free_slots: slot_count,
            record_size,
            _reserved: [0; 10],
        }
    }

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut result = [0u8; Self::SIZE];
        result[0..2].copy_from_slice(&self.slot_count.to_le_bytes());
        result[2..4].copy_from_slice(&self.free_slots.to_le_bytes());
        result[4..6].copy_from_slice(&self.record_size.to_le_bytes());
        result
    }

    pub fn deserialize(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::SIZE {
            return Err(RecordError::Deserialization(format!(
                "Not enough data for page header: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            slot_count: u16::from_le_bytes([data[0], data[1]]),
            free_slots: u16::from_le_bytes([data[2], data[3]]),
            record_size: u16::from_le_bytes([data[4], data[5]]),
            _reserved: [0; 10],
        })
    }

    /// A header of all zeros marks a page that was never formatted
    fn is_blank(&self) -> bool {
        self.slot_count == 0 && self.free_slots == 0 && self.record_size == 0
    }
}

/// Zero-copy slotted page view over a page buffer.
///
/// Layout: 16-byte header, occupancy bitmap (one bit per slot), then
/// fixed-size record slots. The layout is a pure function of the record
/// size, so a page that was extended with zeros but never formatted reads
/// as an empty page. `B` is `&[u8]` for read-only access to cached pages
/// and `&mut [u8]` (or an owned `Vec<u8>`) when slots are changed.
pub struct Page<B> {
    buffer: B,
    header: PageHeader,
}

impl Page<()> {
    /// Calculate maximum number of slots for a given record size
    pub fn calculate_slot_count(record_size: usize) -> usize {
        if record_size == 0 || record_size > PAGE_SIZE {
            return 0;
        }

        let available = PAGE_SIZE - PageHeader::SIZE;

        // Each slot costs its record bytes plus one bitmap bit:
        // slot_count * (record_size * 8 + 1) <= available * 8
        let max_slots = (available * 8) / (1 + record_size * 8);
        max_slots.min(u16::MAX as usize)
    }

    /// Bytes of a freshly formatted, empty page for records of this size
    pub fn empty_page_bytes(record_size: usize) -> RecordResult<Vec<u8>> {
        let mut bytes = vec![0u8; PAGE_SIZE];
        Page::format(&mut bytes, record_size)?;
        Ok(bytes)
    }

    /// Write an empty page layout into `buffer`
    pub fn format(buffer: &mut [u8], record_size: usize) -> RecordResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Buffer must be PAGE_SIZE ({}) bytes, got {}",
                PAGE_SIZE,
                buffer.len()
            )));
        }

        let slot_count = Self::calculate_slot_count(record_size);
        if slot_count == 0 {
            return Err(RecordError::RecordTooLarge {
                record_size,
                page_size: PAGE_SIZE,
            });
        }

        buffer.fill(0);
        let header = PageHeader::new(slot_count as u16, record_size as u16);
        buffer[..PageHeader::SIZE].copy_from_slice(&header.serialize());
        Ok(())
    }
}

impl<B: AsRef<[u8]>> Page<B> {
    /// Wrap an existing page buffer holding records of `record_size` bytes
    pub fn from_buffer(buffer: B, record_size: usize) -> RecordResult<Self> {
        let bytes = buffer.as_ref();
        if bytes.len() != PAGE_SIZE {
            return Err(RecordError::Deserialization(format!(
                "Invalid page size: {} bytes",
                bytes.len()
            )));
        }

        let slot_count = Page::calculate_slot_count(record_size);
        if slot_count == 0 {
            return Err(RecordError::RecordTooLarge {
                record_size,
                page_size: PAGE_SIZE,
            });
        }

        let stored = PageHeader::deserialize(&bytes[..PageHeader::SIZE])?;
        let header = if stored.is_blank() {
            let mut header = PageHeader::new(slot_count as u16, record_size as u16);
            let bitmap = &bytes[PageHeader::SIZE..PageHeader::SIZE + slot_count.div_ceil(8)];
            let used: u32 = bitmap.iter().map(|b| b.count_ones()).sum();
            header.free_slots = header.free_slots.saturating_sub(used as u16);
            header
        } else if stored.slot_count as usize != slot_count
            || stored.record_size as usize != record_size
        {
            return Err(RecordError::Deserialization(format!(
                "Page formatted for {}-byte records, expected {}",
                stored.record_size, record_size
            )));
        } else {
            stored
        };

        Ok(Self { buffer, header })
    }

    fn bitmap_range(&self) -> std::ops::Range<usize> {
        let bitmap_size = (self.header.slot_count as usize).div_ceil(8);
        PageHeader::SIZE..PageHeader::SIZE + bitmap_size
    }

    fn slot_range(&self, slot_id: SlotId) -> std::ops::Range<usize> {
        let record_size = self.header.record_size as usize;
        let start = self.bitmap_range().end + slot_id * record_size;
        start..start + record_size
    }

    /// Find a free slot, returns None if page is full
    pub fn find_free_slot(&self) -> Option<SlotId> {
        if self.header.free_slots == 0 {
            return None;
        }

        (0..self.slot_count()).find(|&slot_id| !self.is_slot_used(slot_id))
    }

    /// Check if a slot is used
    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        if slot_id >= self.slot_count() {
            return false;
        }
        let bitmap = &self.buffer.as_ref()[self.bitmap_range()];
        (bitmap[slot_id / 8] & (1 << (slot_id % 8))) != 0
    }

    /// Get record data from a slot
    pub fn get_record(&self, slot_id: SlotId) -> RecordResult<&[u8]> {
        if slot_id >= self.slot_count() {
            return Err(RecordError::InvalidSlot(slot_id));
        }
        if !self.is_slot_used(slot_id) {
            return Err(RecordError::SlotEmpty(slot_id));
        }

        Ok(&self.buffer.as_ref()[self.slot_range(slot_id)])
    }

    /// Occupied rows in slot order, each carrying its record id
    pub fn records<'s>(
        &'s self,
        page_id: PageId,
        schema: &'s RowSchema,
    ) -> impl Iterator<Item = RecordResult<Record>> + 's {
        (0..self.slot_count())
            .filter(move |&slot_id| self.is_slot_used(slot_id))
            .map(move |slot_id| {
                let mut record = Record::deserialize(self.get_record(slot_id)?, schema)?;
                record.set_rid(Some(RecordId::new(page_id, slot_id)));
                Ok(record)
            })
    }

    /// Get the number of slots in this page
    pub fn slot_count(&self) -> usize {
        self.header.slot_count as usize
    }

    /// Get the number of free slots
    pub fn free_slot_count(&self) -> usize {
        self.header.free_slots as usize
    }

    /// Check if page is full
    pub fn is_full(&self) -> bool {
        self.header.free_slots == 0
    }

    /// Check if page is empty
    pub fn is_empty(&self) -> bool {
        self.header.free_slots == self.header.slot_count
    }

    /// Raw page image
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Page<B> {
    fn write_header(&mut self) {
        let header = self.header.serialize();
        self.buffer.as_mut()[..PageHeader::SIZE].copy_from_slice(&header);
    }

    fn set_slot_bit(&mut self, slot_id: SlotId, used: bool) {
        let range = self.bitmap_range();
        let bitmap = &mut self.buffer.as_mut()[range];
        if used {
            bitmap[slot_id / 8] |= 1 << (slot_id % 8);
        } else {
            bitmap[slot_id / 8] &= !(1 << (slot_id % 8));
        }
    }

    /// Store a row in the first free slot and record its new location
    pub fn insert_record(
        &mut self,
        page_id: PageId,
        record: &mut Record,
        schema: &RowSchema,
    ) -> RecordResult<SlotId> {
        let bytes = record.serialize(schema)?;
        if bytes.len() != self.header.record_size as usize {
            return Err(RecordError::SchemaMismatch(format!(
                "Record is {} bytes, page slots hold {}",
                bytes.len(),
                self.header.record_size
            )));
        }

        let slot_id = self.find_free_slot().ok_or(RecordError::PageFull)?;
        let range = self.slot_range(slot_id);
        self.buffer.as_mut()[range].copy_from_slice(&bytes);
        self.set_slot_bit(slot_id, true);
        self.header.free_slots -= 1;
        self.write_header();

        record.set_rid(Some(RecordId::new(page_id, slot_id)));
        Ok(slot_id)
    }

    /// Clear the slot the row occupies
    pub fn delete_record(&mut self, record: &Record) -> RecordResult<()> {
        let rid = record.rid().ok_or(RecordError::MissingRecordId)?;
        let slot_id = rid.slot_id;

        if slot_id >= self.slot_count() {
            return Err(RecordError::InvalidSlot(slot_id));
        }
        if !self.is_slot_used(slot_id) {
            return Err(RecordError::SlotEmpty(slot_id));
        }

        self.set_slot_bit(slot_id, false);
        self.header.free_slots = (self.header.free_slots + 1).min(self.header.slot_count);
        self.write_header();
        Ok(())
    }
}

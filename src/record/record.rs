use std::fmt;

use super::error::{RecordError, RecordResult};
use super::schema::RowSchema;
use super::value::Value;
use crate::file::{PageId, TableId};

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical location of a record (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }

    pub fn table_id(&self) -> TableId {
        self.page_id.table_id
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot_id)
    }
}

/// A single record (row) with typed values.
/// The record id is set once the row lives on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Record {
    /// Create a new record
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    /// Get the number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if record is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by index
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Serialize the values according to schema: fields back to back,
    /// each in its fixed width
    pub fn serialize(&self, schema: &RowSchema) -> RecordResult<Vec<u8>> {
        schema.validate_record(&self.values)?;

        let mut result = Vec::with_capacity(schema.record_size());
        for (value, col) in self.values.iter().zip(schema.iter()) {
            result.extend_from_slice(&value.serialize(&col.data_type)?);
        }

        Ok(result)
    }

    /// Deserialize record from bytes according to schema
    pub fn deserialize(data: &[u8], schema: &RowSchema) -> RecordResult<Self> {
        if data.len() != schema.record_size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes, got {}",
                schema.record_size(),
                data.len()
            )));
        }

        let mut offset = 0;
        let mut values = Vec::with_capacity(schema.num_fields());
        for col in schema.iter() {
            let col_size = col.size();
            values.push(Value::deserialize(
                &data[offset..offset + col_size],
                &col.data_type,
            )?);
            offset += col_size;
        }

        Ok(Record::new(values))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

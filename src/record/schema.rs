use std::fmt;
use std::hash::{Hash, Hasher};

use super::error::{RecordError, RecordResult};
use super::value::{DataType, Value};

/// One field of a row: its type and an optional (possibly empty) name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Get the size of this column in bytes
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Ordered description of a row shape.
///
/// Two schemas are equal when they have the same field types in the same
/// order. Field names are documentation only and take no part in equality
/// or hashing.
#[derive(Debug, Clone)]
pub struct RowSchema {
    columns: Vec<ColumnDef>,
    record_size: usize,
}

impl RowSchema {
    /// Create a new schema; at least one column is required
    pub fn new(columns: Vec<ColumnDef>) -> RecordResult<Self> {
        if columns.is_empty() {
            return Err(RecordError::EmptySchema);
        }

        let record_size = columns.iter().map(|c| c.size()).sum();
        Ok(Self {
            columns,
            record_size,
        })
    }

    /// Schema with unnamed fields of the given types
    pub fn from_types(types: &[DataType]) -> RecordResult<Self> {
        Self::new(types.iter().map(|&t| ColumnDef::new("", t)).collect())
    }

    /// Schema of exactly one column
    pub fn single(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            record_size: data_type.size(),
            columns: vec![ColumnDef::new(name, data_type)],
        }
    }

    /// Fields of `a` followed by fields of `b`
    pub fn merge(a: &RowSchema, b: &RowSchema) -> RowSchema {
        let mut columns = Vec::with_capacity(a.num_fields() + b.num_fields());
        columns.extend_from_slice(&a.columns);
        columns.extend_from_slice(&b.columns);
        RowSchema {
            columns,
            record_size: a.record_size + b.record_size,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn field_type(&self, index: usize) -> RecordResult<DataType> {
        self.column(index).map(|c| c.data_type)
    }

    pub fn field_name(&self, index: usize) -> RecordResult<&str> {
        self.column(index).map(|c| c.name.as_str())
    }

    /// Get a specific column
    pub fn column(&self, index: usize) -> RecordResult<&ColumnDef> {
        self.columns
            .get(index)
            .ok_or(RecordError::FieldIndexOutOfRange {
                index,
                num_fields: self.columns.len(),
            })
    }

    /// Index of the first field with this name
    pub fn index_of_name(&self, name: &str) -> RecordResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| RecordError::FieldNotFound(name.to_string()))
    }

    /// Get all columns
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDef> {
        self.columns.iter()
    }

    /// Get total record size in bytes
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Get the byte offset of a column within a record
    pub fn column_offset(&self, index: usize) -> RecordResult<usize> {
        if index >= self.columns.len() {
            return Err(RecordError::FieldIndexOutOfRange {
                index,
                num_fields: self.columns.len(),
            });
        }
        Ok(self.columns[..index].iter().map(|c| c.size()).sum())
    }

    /// Validate a record against this schema
    pub fn validate_record(&self, values: &[Value]) -> RecordResult<()> {
        if values.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} columns, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        for (value, col) in values.iter().zip(&self.columns) {
            if !value.fits(&col.data_type) {
                return Err(RecordError::TypeMismatch {
                    expected: col.data_type.to_string(),
                    actual: format!("{:?}", value),
                });
            }
        }

        Ok(())
    }
}

impl PartialEq for RowSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for RowSchema {}

impl Hash for RowSchema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.columns.len().hash(state);
        for col in &self.columns {
            col.data_type.hash(state);
        }
    }
}

impl<'a> IntoIterator for &'a RowSchema {
    type Item = &'a ColumnDef;
    type IntoIter = std::slice::Iter<'a, ColumnDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl fmt::Display for RowSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", col.data_type, col.name)?;
        }
        Ok(())
    }
}

use super::error::{ExecError, ExecResult};
use super::operator::Fetch;
use crate::record::{Record, RowSchema};

/// Leaf operator over rows held in memory
pub struct Values {
    schema: RowSchema,
    rows: Vec<Record>,
    position: usize,
}

impl Values {
    pub fn new(schema: RowSchema, rows: Vec<Record>) -> Self {
        Self {
            schema,
            rows,
            position: 0,
        }
    }

    /// Like [`Values::new`], rejecting rows that do not match the schema
    pub fn checked(schema: RowSchema, rows: Vec<Record>) -> ExecResult<Self> {
        for row in &rows {
            schema
                .validate_record(row.values())
                .map_err(|e| ExecError::SchemaMismatch(e.to_string()))?;
        }
        Ok(Self::new(schema, rows))
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }
}

impl Fetch for Values {
    fn open(&mut self) -> ExecResult<()> {
        self.position = 0;
        Ok(())
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Record>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.position = 0;
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }
}

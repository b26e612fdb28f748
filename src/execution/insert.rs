use std::sync::Arc;

use super::StorageErrorPolicy;
use super::error::{ExecError, ExecResult};
use super::operator::{Fetch, Operator, expect_children};
use crate::file::{TableId, TransactionId};
use crate::record::{DataType, Record, RecordManager, RowSchema, Value};

/// Drains its child into a table and yields a single row with the number
/// of rows inserted.
///
/// The summary is produced once per operator: after it has been handed out
/// the operator stays at its end, including across `rewind`.
pub struct Insert {
    records: Arc<RecordManager>,
    txn: TransactionId,
    child: Box<dyn Operator>,
    table_id: TableId,
    schema: RowSchema,
    policy: StorageErrorPolicy,
    done: bool,
}

impl Insert {
    pub fn new(
        records: Arc<RecordManager>,
        txn: TransactionId,
        child: Box<dyn Operator>,
        table_id: TableId,
    ) -> Self {
        Self {
            records,
            txn,
            child,
            table_id,
            schema: RowSchema::single("inserted", DataType::Int),
            policy: StorageErrorPolicy::default(),
            done: false,
        }
    }

    pub fn with_error_policy(mut self, policy: StorageErrorPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Fetch for Insert {
    fn open(&mut self) -> ExecResult<()> {
        let table = self.records.table(self.table_id)?;
        if table.schema() != self.child.schema() {
            return Err(ExecError::SchemaMismatch(format!(
                "table {} stores ({}), child produces ({})",
                self.table_id,
                table.schema(),
                self.child.schema()
            )));
        }
        self.child.open()
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0;
        while self.child.has_next()? {
            let mut record = self.child.next()?;
            if let Err(err) = self.records.insert_row(self.txn, self.table_id, &mut record) {
                self.policy.absorb(err, "insert")?;
            }
            count += 1;
        }

        Ok(Some(Record::new(vec![Value::Int(count)])))
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn children(&self) -> Vec<&dyn Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) -> ExecResult<()> {
        let [child] = expect_children::<1>(children)?;
        self.child = child;
        Ok(())
    }
}

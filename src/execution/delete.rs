use std::sync::Arc;

use super::StorageErrorPolicy;
use super::error::ExecResult;
use super::operator::{Fetch, Operator, expect_children};
use crate::file::TransactionId;
use crate::record::{DataType, Record, RecordManager, RowSchema, Value};

/// Removes every row its child produces and yields a single row with the
/// number of rows deleted. Rows are located by their record id, so the
/// child must produce rows read from storage.
pub struct Delete {
    records: Arc<RecordManager>,
    txn: TransactionId,
    child: Box<dyn Operator>,
    schema: RowSchema,
    policy: StorageErrorPolicy,
    done: bool,
}

impl Delete {
    pub fn new(records: Arc<RecordManager>, txn: TransactionId, child: Box<dyn Operator>) -> Self {
        Self {
            records,
            txn,
            child,
            schema: RowSchema::single("deleted", DataType::Int),
            policy: StorageErrorPolicy::default(),
            done: false,
        }
    }

    pub fn with_error_policy(mut self, policy: StorageErrorPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Fetch for Delete {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0;
        while self.child.has_next()? {
            let record = self.child.next()?;
            if let Err(err) = self.records.delete_row(self.txn, &record) {
                self.policy.absorb(err, "delete")?;
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

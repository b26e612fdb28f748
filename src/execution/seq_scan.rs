use std::sync::Arc;

use super::error::{ExecError, ExecResult};
use super::operator::Fetch;
use crate::file::{TableId, TransactionId};
use crate::record::{HeapFileScan, Record, RecordManager, RowSchema};

/// Leaf operator reading every row of one table
pub struct SeqScan {
    records: Arc<RecordManager>,
    txn: TransactionId,
    table_id: TableId,
    schema: RowSchema,
    scan: Option<HeapFileScan>,
}

impl SeqScan {
    pub fn new(
        records: Arc<RecordManager>,
        txn: TransactionId,
        table_id: TableId,
    ) -> ExecResult<Self> {
        let schema = records.table(table_id)?.schema().clone();
        Ok(Self {
            records,
            txn,
            table_id,
            schema,
            scan: None,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }
}

impl Fetch for SeqScan {
    fn open(&mut self) -> ExecResult<()> {
        let mut scan = self.records.scan(self.txn, self.table_id)?;
        scan.open()?;
        self.scan = Some(scan);
        Ok(())
    }

    fn fetch_next(&mut self) -> ExecResult<Option<Record>> {
        let scan = self.scan.as_mut().ok_or(ExecError::NotOpen)?;
        Ok(scan.next()?)
    }

    fn close(&mut self) {
        if let Some(mut scan) = self.scan.take() {
            scan.close();
        }
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }
}

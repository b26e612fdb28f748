mod aggregate;
mod delete;
mod error;
mod insert;
mod operator;
mod seq_scan;
mod values;


pub use aggregate::{
    Aggregate, AggregateOp, Aggregator, GroupKey, IntegerAggregator, StringAggregator,
};
pub use delete::Delete;
pub use error::{ExecError, ExecResult};
pub use insert::Insert;
pub use operator::{Buffered, Fetch, Operator};
pub use seq_scan::SeqScan;
pub use values::Values;

use crate::record::RecordError;

/// What a mutating operator does when storing or removing one row fails
/// inside the backing store.
///
/// Only storage failures are subject to the policy. Aborted transactions,
/// validation errors and lookups that find nothing always propagate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageErrorPolicy {
    /// Stop and return the error
    #[default]
    Propagate,
    /// Log the failure, count the row as processed and carry on
    LogAndCount,
}

impl StorageErrorPolicy {
    fn absorb(self, err: RecordError, action: &str) -> ExecResult<()> {
        if self == StorageErrorPolicy::LogAndCount && err.is_storage_failure() {
            log::warn!("{} failed, row counted anyway: {}", action, err);
            return Ok(());
        }
        Err(err.into())
    }
}

pub mod execution;
pub mod file;
pub mod optimizer;
pub mod record;

pub use execution::{
    Aggregate, AggregateOp, Aggregator, Delete, ExecError, ExecResult, Insert, Operator, SeqScan,
    StorageErrorPolicy,
};
pub use file::{BUFFER_POOL_SIZE, BufferManager, PAGE_SIZE, PageId, PagedFileManager, TransactionId};
pub use optimizer::{IntHistogram, PredicateOp, StatsError, TableStats};
pub use record::{
    ColumnDef, DataType, HeapFile, Record, RecordError, RecordId, RecordManager, RecordResult,
    RowSchema, Value,
};

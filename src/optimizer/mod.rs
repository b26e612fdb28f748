mod error;
mod histogram;
mod table_stats;

pub use error::{StatsError, StatsResult};
pub use histogram::{IntHistogram, PredicateOp};
pub use table_stats::TableStats;

/// Buckets per column histogram
pub const NUM_HIST_BINS: usize = 100;

/// Cost charged for reading one page from disk
pub const DEFAULT_IO_COST_PER_PAGE: f64 = 1000.0;

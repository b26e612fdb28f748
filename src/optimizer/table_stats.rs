use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{StatsError, StatsResult};
use super::histogram::{IntHistogram, PredicateOp};
use super::NUM_HIST_BINS;
use crate::file::{TableId, TransactionId};
use crate::record::{DataType, HeapFileScan, RecordManager, Value};

/// Row count, page count and per-column histograms of one table, as seen
/// by a cost model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStats {
    table_id: TableId,
    io_cost_per_page: f64,
    num_pages: usize,
    total_rows: usize,
    /// One entry per column; `None` for columns without a histogram
    histograms: Vec<Option<IntHistogram>>,
}

impl TableStats {
    /// Scan a table twice: once for each INT column's bounds, then again to
    /// fill histograms over those bounds
    pub fn compute(
        records: &RecordManager,
        txn: TransactionId,
        table_id: TableId,
        io_cost_per_page: f64,
    ) -> StatsResult<Self> {
        let table = records.table(table_id)?;
        let num_pages = {
            let buffer_manager = records.buffer_manager();
            let buffer_manager = buffer_manager.lock();
            table.page_count(buffer_manager.file_manager())?
        };
        let int_columns: Vec<usize> = table
            .schema()
            .iter()
            .enumerate()
            .filter(|(_, column)| column.data_type == DataType::Int)
            .map(|(index, _)| index)
            .collect();

        let mut scan = records.scan(txn, table_id)?;
        let mut bounds: Vec<Option<(i32, i32)>> = vec![None; table.schema().num_fields()];
        let total_rows = for_each_int(&mut scan, &int_columns, |index, v| {
            let bound = &mut bounds[index];
            *bound = Some(match *bound {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        })?;

        let mut histograms = Vec::with_capacity(bounds.len());
        for (index, bound) in bounds.iter().enumerate() {
            histograms.push(if int_columns.contains(&index) {
                let (lo, hi) = bound.unwrap_or((0, 0));
                Some(IntHistogram::new(NUM_HIST_BINS, lo, hi)?)
            } else {
                None
            });
        }

        // Values cannot fall outside bounds taken from the same rows, unless
        // the table changed between the passes
        let mut out_of_range = None;
        for_each_int(&mut scan, &int_columns, |index, v| {
            if let Some(Err(err)) = histograms[index].as_mut().map(|h| h.add_value(v)) {
                out_of_range.get_or_insert(err);
            }
        })?;
        scan.close();
        if let Some(err) = out_of_range {
            return Err(err);
        }

        log::debug!(
            "Computed statistics for table {}: {} rows on {} pages",
            table_id,
            total_rows,
            num_pages
        );

        Ok(Self {
            table_id,
            io_cost_per_page,
            num_pages,
            total_rows,
            histograms,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn histogram(&self, field: usize) -> Option<&IntHistogram> {
        self.histograms.get(field).and_then(Option::as_ref)
    }

    /// Estimated fraction of rows with `field op v`
    pub fn estimate_selectivity(&self, field: usize, op: PredicateOp, v: i32) -> StatsResult<f64> {
        self.histogram(field)
            .map(|hist| hist.estimate_selectivity(op, v))
            .ok_or(StatsError::UnknownField(field))
    }

    /// Cost of reading every page once
    pub fn estimate_scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page
    }

    /// Rows expected to survive a predicate of the given selectivity
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.total_rows as f64 * selectivity.clamp(0.0, 1.0)) as usize
    }

    pub fn load(path: &Path) -> StatsResult<Self> {
        let content = fs::read_to_string(path)?;
        let stats = serde_json::from_str(&content)?;
        Ok(stats)
    }

    pub fn save(&self, path: &Path) -> StatsResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Run one full pass of `scan`, handing every INT column value to `visit`.
/// Returns the number of rows seen.
fn for_each_int(
    scan: &mut HeapFileScan,
    int_columns: &[usize],
    mut visit: impl FnMut(usize, i32),
) -> StatsResult<usize> {
    if scan.is_open() {
        scan.rewind()?;
    } else {
        scan.open()?;
    }
    let mut rows = 0;
    while let Some(record) = scan.next()? {
        rows += 1;
        for &index in int_columns {
            if let Some(Value::Int(v)) = record.get(index) {
                visit(index, *v);
            }
        }
    }
    Ok(rows)
}

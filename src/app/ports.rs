use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// Destination for finished tables.
///
/// `write_table` replaces whatever was previously stored under
/// `table_name`. When `partition_by` is non-empty the rows are split on
/// those columns, which are then left out of the stored data.
pub trait TableSink: Send + Sync {
    fn write_table(
        &self,
        table_name: &str,
        batch: &RecordBatch,
        partition_by: &[&str],
    ) -> Result<Vec<String>>;
}

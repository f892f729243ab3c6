use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::TableSink;
use crate::error::Result;
use crate::pipeline::parquet_out::{escape_partition_value, partition_batch};

const PART_FILE: &str = "part-00000.parquet";
const ZSTD_LEVEL: i32 = 3;

/// Writes each table as a parquet dataset under `<root>/<table>.parquet/`.
///
/// Existing datasets are replaced. Partitioned tables use Hive-style
/// `column=value` directories.
pub struct ParquetSink {
    root: PathBuf,
}

impl ParquetSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_dir(&self, table_name: &str) -> PathBuf {
        self.root.join(format!("{}.parquet", table_name))
    }

    fn writer_properties() -> Result<WriterProperties> {
        Ok(WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(ZSTD_LEVEL)?))
            .build())
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(Self::writer_properties()?))?;
        writer.write(batch)?;
        writer.close()?;
        debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet file");
        Ok(())
    }
}

impl TableSink for ParquetSink {
    fn write_table(
        &self,
        table_name: &str,
        batch: &RecordBatch,
        partition_by: &[&str],
    ) -> Result<Vec<String>> {
        let dir = self.table_dir(table_name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let mut written = Vec::new();
        if partition_by.is_empty() {
            let path = dir.join(PART_FILE);
            self.write_file(&path, batch)?;
            written.push(path.display().to_string());
        } else {
            for (spec, part) in partition_batch(batch, partition_by)? {
                let mut path = dir.clone();
                for (column, value) in &spec {
                    path.push(format!("{}={}", column, escape_partition_value(value)));
                }
                path.push(PART_FILE);
                self.write_file(&path, &part)?;
                written.push(path.display().to_string());
            }
        }

        info!(
            table = table_name,
            rows = batch.num_rows(),
            files = written.len(),
            "📦 wrote {}",
            dir.display()
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::pipeline::parquet_out::to_record_batch;
    use crate::types::{Table, UsState};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn states(ids: &[&str]) -> RecordBatch {
        let rows = ids
            .iter()
            .map(|id| UsState { us_state_id: id.to_string(), us_state_name: format!("name {id}") })
            .collect();
        to_record_batch(&Table::new(DIM_US_STATES, rows)).unwrap()
    }

    fn read_rows(path: &Path) -> usize {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        reader.map(|b| b.unwrap().num_rows()).sum()
    }

    #[test]
    fn flat_table_overwrites_previous_run() {
        let dir = tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());

        sink.write_table(DIM_US_STATES, &states(&["AL", "AK", "AZ"]), &[]).unwrap();
        let stale = sink.table_dir(DIM_US_STATES).join("stale.parquet");
        fs::write(&stale, b"old").unwrap();

        let written = sink.write_table(DIM_US_STATES, &states(&["AL"]), &[]).unwrap();
        assert_eq!(written.len(), 1);
        assert!(!stale.exists());
        assert_eq!(read_rows(Path::new(&written[0])), 1);
        assert!(written[0].ends_with("dim_us_states.parquet/part-00000.parquet"));
    }

    #[test]
    fn partitioned_table_uses_hive_directories() {
        let dir = tempdir().unwrap();
        let sink = ParquetSink::new(dir.path());

        let written = sink
            .write_table(DIM_US_STATES, &states(&["AL", "A/K", "AL"]), &["us_state_id"])
            .unwrap();
        assert_eq!(written.len(), 2);

        let al = sink
            .table_dir(DIM_US_STATES)
            .join("us_state_id=AL")
            .join(PART_FILE);
        assert_eq!(read_rows(&al), 2);
        assert!(sink
            .table_dir(DIM_US_STATES)
            .join("us_state_id=A%2FK")
            .join(PART_FILE)
            .exists());
    }
}

use arrow::record_batch::RecordBatch;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::app::ports::TableSink;
use crate::error::Result;

/// A table as handed to the sink
#[derive(Debug, Clone)]
pub struct StoredTable {
    pub name: String,
    pub batch: RecordBatch,
    pub partition_by: Vec<String>,
}

/// In-memory sink for development/testing.
///
/// Clones share the same store, so a test can keep one handle while the
/// pipeline owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    tables: Arc<Mutex<Vec<StoredTable>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<StoredTable> {
        self.lock().iter().find(|t| t.name == name).cloned()
    }

    /// Names in the order they were first written.
    pub fn table_names(&self) -> Vec<String> {
        self.lock().iter().map(|t| t.name.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredTable>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TableSink for InMemorySink {
    fn write_table(
        &self,
        table_name: &str,
        batch: &RecordBatch,
        partition_by: &[&str],
    ) -> Result<Vec<String>> {
        let stored = StoredTable {
            name: table_name.to_string(),
            batch: batch.clone(),
            partition_by: partition_by.iter().map(|p| p.to_string()).collect(),
        };

        let mut tables = self.lock();
        match tables.iter_mut().find(|t| t.name == table_name) {
            Some(existing) => *existing = stored,
            None => tables.push(stored),
        }
        debug!(table = table_name, rows = batch.num_rows(), "stored table in memory");
        Ok(vec![format!("memory://{}", table_name)])
    }
}

use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

use crate::app::ports::TableSink;
use crate::constants::FACT_PARTITION_COLUMNS;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::parquet_out::{to_record_batch, ArrowTable};
use crate::pipeline::processing::quality_gate::ValidatedTables;
use crate::types::Table;

/// What one table's write produced
#[derive(Debug, Clone, Serialize)]
pub struct PublishedTable {
    pub table: String,
    pub rows: usize,
    pub locations: Vec<String>,
}

/// Use case for writing validated tables to a sink
pub struct PublishUseCase {
    sink: Box<dyn TableSink>,
}

impl PublishUseCase {
    pub fn new(sink: Box<dyn TableSink>) -> Self {
        Self { sink }
    }

    /// Writes the fact table partitioned, then the six dimensions flat.
    #[instrument(skip_all)]
    pub fn publish(&self, tables: ValidatedTables) -> Result<Vec<PublishedTable>> {
        let started = Instant::now();
        let schema = tables.into_inner();

        let published = vec![
            self.write(&schema.immigration_facts, &FACT_PARTITION_COLUMNS)?,
            self.write(&schema.city_demography, &[])?,
            self.write(&schema.travel_modes, &[])?,
            self.write(&schema.countries, &[])?,
            self.write(&schema.visa_categories, &[])?,
            self.write(&schema.us_states, &[])?,
            self.write(&schema.airport_codes, &[])?,
        ];

        metrics::stage_duration("publish", started.elapsed().as_secs_f64());
        Ok(published)
    }

    fn write<R: ArrowTable>(&self, table: &Table<R>, partition_by: &[&str]) -> Result<PublishedTable> {
        info!(table = table.name(), rows = table.len(), "writing table");
        let batch = to_record_batch(table)?;
        let locations = self.sink.write_table(table.name(), &batch, partition_by)?;
        metrics::publish::rows_published(table.name(), table.len());

        Ok(PublishedTable {
            table: table.name().to_string(),
            rows: table.len(),
            locations,
        })
    }
}

// Data processing pipeline: ingestion, processing, and storage

pub mod ingestion;
pub mod parquet_out;
pub mod processing;
pub mod storage;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app::ports::TableSink;
use crate::app::publish_use_case::{PublishUseCase, PublishedTable};
use crate::config::Config;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::StarSchema;
use processing::dimensions;
use processing::facts::{ColumnMapping, FactBuilder};
use processing::parser::LabelDomain;
use processing::quality_gate::{self, ValidatedTables};

pub use processing::parser;

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub row_counts: BTreeMap<String, usize>,
    pub published: Vec<PublishedTable>,
}

pub struct Pipeline;

impl Pipeline {
    /// Reads the three inputs and builds all seven tables.
    #[instrument(skip_all)]
    pub fn build(config: &Config) -> Result<StarSchema> {
        let started = Instant::now();
        let data = &config.data;

        let catalog = ingestion::read_label_catalog(&data.labels_path)?;
        let travel_modes = dimensions::build_travel_modes(catalog.records(LabelDomain::TravelMode)?)?;
        let countries = dimensions::build_countries(catalog.records(LabelDomain::Country)?)?;
        let visa_categories =
            dimensions::build_visa_categories(catalog.records(LabelDomain::VisaCategory)?)?;
        let us_states = dimensions::build_us_states(catalog.records(LabelDomain::UsState)?);
        let airport_codes = dimensions::build_airport_codes(catalog.records(LabelDomain::AirportCode)?);
        info!("🏷️ label dimensions built");

        let city_demography =
            dimensions::build_city_demography(ingestion::read_demography(&data.demography_path)?);

        let mapping = ColumnMapping::immigration()?;
        let raw = ingestion::read_immigration(&data.immigration_path, &mapping)?;
        let immigration_facts = FactBuilder::new(mapping).build(raw)?;

        metrics::stage_duration("build", started.elapsed().as_secs_f64());
        Ok(StarSchema {
            immigration_facts,
            city_demography,
            travel_modes,
            countries,
            visa_categories,
            us_states,
            airport_codes,
        })
    }

    /// Builds and gates without publishing.
    pub fn validate(config: &Config) -> Result<ValidatedTables> {
        let schema = Self::build(config)?;
        Self::gate(schema)
    }

    /// Full run: build, gate, then publish through `sink`.
    #[instrument(skip_all, fields(run_id))]
    pub fn run(config: &Config, sink: Box<dyn TableSink>) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();
        info!("🚀 starting run {}", run_id);

        let validated = Self::validate(config)?;
        let row_counts = validated.schema().row_counts().into_iter().collect();
        let published = PublishUseCase::new(sink).publish(validated)?;

        let report = PipelineReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            row_counts,
            published,
        };
        info!(
            tables = report.published.len(),
            seconds = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0,
            "✅ run {} finished",
            run_id
        );
        Ok(report)
    }

    fn gate(schema: StarSchema) -> Result<ValidatedTables> {
        let started = Instant::now();
        let validated = quality_gate::validate(schema)?;
        metrics::stage_duration("quality_gate", started.elapsed().as_secs_f64());
        info!("🛡️ quality gate passed");
        Ok(validated)
    }
}

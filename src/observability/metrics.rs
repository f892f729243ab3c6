//! Metrics for the ETL run
//!
//! Counters and histograms go through the `metrics` facade; the binary
//! installs a Prometheus recorder and writes its rendering to disk at the
//! end of a run.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{EtlError, Result};

/// Enum representing all metric names used in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    LabelRecordsParsed,
    RowsRead,
    RowsBuilt,
    RowsDeduplicated,
    QualityChecks,
    RowsPublished,
    StageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LabelRecordsParsed => "etl_label_records_parsed_total",
            MetricName::RowsRead => "etl_rows_read_total",
            MetricName::RowsBuilt => "etl_rows_built_total",
            MetricName::RowsDeduplicated => "etl_rows_deduplicated_total",
            MetricName::QualityChecks => "etl_quality_checks_total",
            MetricName::RowsPublished => "etl_rows_published_total",
            MetricName::StageDuration => "etl_stage_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installs the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EtlError::Config(format!("failed to install metrics recorder: {}", e)))
}

/// Writes the current rendering of `handle` to `path`.
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, handle.render())?;
    Ok(())
}

pub mod parser {
    use super::MetricName;

    pub fn records_parsed(marker: &str, count: usize) {
        ::metrics::counter!(MetricName::LabelRecordsParsed.as_str(), "marker" => marker.to_string())
            .increment(count as u64);
    }
}

pub mod ingestion {
    use super::MetricName;

    pub fn rows_read(source: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RowsRead.as_str(), "source" => source).increment(count as u64);
    }
}

pub mod builder {
    use super::MetricName;

    pub fn rows_built(table: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RowsBuilt.as_str(), "table" => table).increment(count as u64);
    }

    pub fn rows_deduplicated(table: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RowsDeduplicated.as_str(), "table" => table)
            .increment(count as u64);
    }
}

pub mod quality_gate {
    use super::MetricName;

    pub fn check_recorded(check: &'static str, table: &str, passed: bool) {
        let outcome = if passed { "passed" } else { "failed" };
        ::metrics::counter!(
            MetricName::QualityChecks.as_str(),
            "check" => check,
            "table" => table.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

pub mod publish {
    use super::MetricName;

    pub fn rows_published(table: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RowsPublished.as_str(), "table" => table)
            .increment(count as u64);
    }
}

/// Records how long a pipeline stage took.
pub fn stage_duration(stage: &'static str, seconds: f64) {
    ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(seconds);
}

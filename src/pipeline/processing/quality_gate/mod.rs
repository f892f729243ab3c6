use tracing::{debug, error, info, instrument};

use crate::error::{EtlError, QualityRule, Result};
use crate::observability::metrics;
use crate::types::{StarSchema, TableStats};

/// Tables that passed every quality check. Only the gate constructs this,
/// and the publisher only accepts this, so unchecked tables cannot be
/// written.
#[derive(Debug)]
pub struct ValidatedTables {
    schema: StarSchema,
}

impl ValidatedTables {
    pub fn schema(&self) -> &StarSchema {
        &self.schema
    }

    pub fn into_inner(self) -> StarSchema {
        self.schema
    }
}

/// A single check performed by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    UniqueKey,
    NonEmpty,
}

impl QualityCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCheck::UniqueKey => "unique_key",
            QualityCheck::NonEmpty => "non_empty",
        }
    }

    fn rule(&self) -> QualityRule {
        match self {
            QualityCheck::UniqueKey => QualityRule::KeyNotUnique,
            QualityCheck::NonEmpty => QualityRule::TableEmpty,
        }
    }

    fn passes(&self, table: &dyn TableStats) -> bool {
        match self {
            QualityCheck::UniqueKey => table.distinct_key_count() == table.row_count(),
            QualityCheck::NonEmpty => table.row_count() > 0,
        }
    }

    /// Runs the check, failing with a message naming the table and rule.
    pub fn run(&self, table: &dyn TableStats) -> Result<()> {
        let passed = self.passes(table);
        metrics::quality_gate::check_recorded(self.as_str(), table.table_name(), passed);
        if passed {
            debug!(
                table = table.table_name(),
                check = self.as_str(),
                key = ?table.key_columns(),
                "quality check passed"
            );
            return Ok(());
        }

        let err = EtlError::QualityCheck {
            table: table.table_name().to_string(),
            rule: self.rule(),
        };
        error!(table = table.table_name(), check = self.as_str(), "{}", err);
        Err(err)
    }
}

/// Fails unless the table's declared key is unique across rows.
pub fn unique_key_check(table: &dyn TableStats) -> Result<()> {
    QualityCheck::UniqueKey.run(table)
}

/// Fails on a table with no rows.
pub fn empty_table_check(table: &dyn TableStats) -> Result<()> {
    QualityCheck::NonEmpty.run(table)
}

/// Runs every check over a star schema, stopping at the first failure.
///
/// Key checks run first (label dimensions, then the demography composite
/// key), then non-emptiness over all seven tables with the fact first.
#[instrument(skip_all)]
pub fn validate(schema: StarSchema) -> Result<ValidatedTables> {
    for table in schema.label_dimensions() {
        unique_key_check(table)?;
    }
    unique_key_check(&schema.city_demography)?;
    info!("unique key checks passed");

    for table in schema.all_tables() {
        empty_table_check(table)?;
    }
    info!("empty table checks passed");

    Ok(ValidatedTables { schema })
}

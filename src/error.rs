use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Label parse error: {0}")]
    LabelParse(#[from] LabelParseError),

    #[error("Cannot coerce value '{value}' in {table}.{column}")]
    TypeCoercion {
        table: String,
        column: String,
        value: String,
    },

    #[error("SAS day offset {offset} in column {column} is outside the representable date range")]
    DateOutOfRange { column: String, offset: f64 },

    #[error("Data quality check not passed for {table}. {rule}")]
    QualityCheck { table: String, rule: QualityRule },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Failures of the label-description mini-format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelParseError {
    #[error("marker '{marker}' not found in label file")]
    MarkerNotFound { marker: String },

    #[error("section for marker '{marker}' has no terminating ';'")]
    UnterminatedSection { marker: String },
}

/// The rule a table violated in the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityRule {
    KeyNotUnique,
    TableEmpty,
}

impl fmt::Display for QualityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityRule::KeyNotUnique => write!(f, "Key is not unique"),
            QualityRule::TableEmpty => write!(f, "Table is empty"),
        }
    }
}

impl EtlError {
    pub fn coercion(table: &str, column: &str, value: impl fmt::Display) -> Self {
        EtlError::TypeCoercion {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

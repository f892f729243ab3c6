use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::{EtlError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Environment variables that override the file-based paths.
pub const ENV_IMMIGRATION_PATH: &str = "IMMIGRATION_FILE_PATH";
pub const ENV_LABELS_PATH: &str = "LABELS_DESCRIPTION_FILE_PATH";
pub const ENV_DEMOGRAPHY_PATH: &str = "DEMOGRAPHY_FILE_PATH";
pub const ENV_DESTINATION_ROOT: &str = "DESTINATION_ROOT";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Input locations for the three raw sources.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// A parquet file or a directory of parquet files.
    pub immigration_path: PathBuf,
    pub labels_path: PathBuf,
    pub demography_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub destination_root: PathBuf,
    /// Where to write the Prometheus snapshot after a run.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: default_log_dir() }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    /// Reads `path`, applies environment overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&config_content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Overrides paths with non-empty values returned by `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        if let Some(p) = get(ENV_IMMIGRATION_PATH) {
            self.data.immigration_path = p;
        }
        if let Some(p) = get(ENV_LABELS_PATH) {
            self.data.labels_path = p;
        }
        if let Some(p) = get(ENV_DEMOGRAPHY_PATH) {
            self.data.demography_path = p;
        }
        if let Some(p) = get(ENV_DESTINATION_ROOT) {
            self.output.destination_root = p;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let paths = [
            ("data.immigration_path", &self.data.immigration_path),
            ("data.labels_path", &self.data.labels_path),
            ("data.demography_path", &self.data.demography_path),
            ("output.destination_root", &self.output.destination_root),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(EtlError::Config(format!("{} must not be empty", name)));
            }
        }

        // Only local or mounted destinations are written by this crate.
        let destination = self.output.destination_root.to_string_lossy();
        if destination.contains("://") {
            return Err(EtlError::Config(format!(
                "output.destination_root '{}' is a URL; only filesystem destinations are supported",
                destination
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[data]
immigration_path = "data/immigration"
labels_path = "data/labels.SAS"
demography_path = "data/demography.csv"

[output]
destination_root = "out"
"#;

    #[test]
    fn parses_and_defaults_logging() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.data.labels_path, PathBuf::from("data/labels.SAS"));
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
        assert!(config.output.metrics_path.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides_replace_paths() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_LABELS_PATH, "/mnt/labels.SAS"),
            (ENV_DESTINATION_ROOT, "/mnt/out"),
            (ENV_DEMOGRAPHY_PATH, "  "),
        ]
        .into_iter()
        .collect();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.data.labels_path, PathBuf::from("/mnt/labels.SAS"));
        assert_eq!(config.output.destination_root, PathBuf::from("/mnt/out"));
        assert_eq!(config.data.demography_path, PathBuf::from("data/demography.csv"));
    }

    #[test]
    fn rejects_object_store_destination() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.output.destination_root = PathBuf::from("s3://bucket/prefix/");
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }

    #[test]
    fn rejects_empty_path() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.data.immigration_path = PathBuf::new();
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }
}

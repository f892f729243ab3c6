use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use immigration_etl::config::{Config, DEFAULT_CONFIG_PATH};
use immigration_etl::infra::ParquetSink;
use immigration_etl::logging;
use immigration_etl::observability;
use immigration_etl::pipeline::ingestion;
use immigration_etl::pipeline::parser::LabelDomain;
use immigration_etl::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "immigration_etl")]
#[command(about = "Builds the immigration star schema from raw I-94 data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, check and publish every table
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Build and check every table without writing anything
    Validate {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Print the parsed pairs of one label section as JSON lines
    Labels {
        /// One of: travel-mode, country, visa-category, us-state, airport-code
        #[arg(long)]
        domain: LabelDomain,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

impl Commands {
    fn config_path(&self) -> &PathBuf {
        match self {
            Commands::Run { config } | Commands::Validate { config } | Commands::Labels { config, .. } => {
                config
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli.command.config_path();
    let config = Config::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let _guard = logging::init_logging(&config.logging.dir);
    let metrics = observability::install_recorder().context("installing metrics recorder")?;

    let outcome = execute(cli.command, &config);
    if let Err(e) = &outcome {
        error!("❌ {:#}", e);
    }

    if let Some(path) = &config.output.metrics_path {
        observability::write_snapshot(&metrics, path)
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }
    outcome
}

fn execute(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Run { .. } => {
            let sink = ParquetSink::new(&config.output.destination_root);
            let report = Pipeline::run(config, Box::new(sink)).context("pipeline run failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Validate { .. } => {
            let validated = Pipeline::validate(config).context("validation failed")?;
            let counts = validated.schema().row_counts();
            info!("all quality checks passed");
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Commands::Labels { domain, .. } => {
            let catalog = ingestion::read_label_catalog(&config.data.labels_path)
                .with_context(|| format!("reading {}", config.data.labels_path.display()))?;
            for record in catalog.records(domain)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    Ok(())
}

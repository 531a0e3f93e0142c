//! Quarry CLI - Command line interface for the content-graph exporter

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, export, models};
use config::Config;
use quarry_core::{DataSource, SchemaRegistry};
use quarry_source::Dataset;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about = "Depth-bounded exporter for content graphs")]
pub struct Cli {
    /// Dataset file (JSON schema and records)
    #[arg(short, long, global = true, env = "QUARRY_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Data-source backend
    #[arg(short, long, global = true, env = "QUARRY_BACKEND")]
    pub backend: Option<Backend>,

    /// SQLite database file for the sqlite backend
    #[arg(long, global = true, env = "QUARRY_DATABASE")]
    pub database: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/quarry/config.toml)
    #[arg(long, global = true, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Path of the config file in effect
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(config::config_file_path)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export a model, an alias, or the whole database
    Export(export::ExportArgs),
    /// Inspect the models of a dataset
    Models(models::ModelsArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Data-source backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// Load the dataset into memory
    #[default]
    Memory,
    /// Read records from a SQLite database, seeded from the dataset when empty
    Sqlite,
}

/// Application context with schema registry and data source
pub struct AppContext {
    pub registry: Arc<dyn SchemaRegistry>,
    pub source: Arc<dyn DataSource>,
}

impl AppContext {
    pub fn open(cli: &Cli, config: &Config) -> anyhow::Result<Self> {
        let dataset_path = cli
            .dataset
            .clone()
            .or_else(|| config.dataset.clone())
            .context("No dataset configured. Pass --dataset or run `quarry config set dataset <path>`")?;
        let backend = match cli.backend {
            Some(backend) => backend,
            None => config.backend()?.unwrap_or_default(),
        };

        tracing::debug!("Loading dataset from {:?} ({:?} backend)", dataset_path, backend);
        let dataset = Dataset::load(&dataset_path)
            .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;

        match backend {
            Backend::Memory => {
                let (registry, source) = dataset.into_memory()?;
                Ok(Self {
                    registry,
                    source: Arc::new(source),
                })
            }
            Backend::Sqlite => Self::open_sqlite(cli, config, &dataset_path, dataset),
        }
    }

    #[cfg(feature = "sqlite")]
    fn open_sqlite(
        cli: &Cli,
        config: &Config,
        dataset_path: &std::path::Path,
        dataset: Dataset,
    ) -> anyhow::Result<Self> {
        use quarry_source::SqliteSource;

        let db_path = cli
            .database
            .clone()
            .or_else(|| config.database.clone())
            .unwrap_or_else(|| dataset_path.with_extension("db"));
        tracing::debug!("Using database at: {:?}", db_path);

        let registry: Arc<dyn SchemaRegistry> = Arc::new(dataset.registry());
        let source = SqliteSource::open(&db_path, registry.clone())?;
        if source.is_empty()? {
            let written = dataset.write_to(&source)?;
            tracing::info!("Seeded {} with {} row(s)", db_path.display(), written);
        }

        Ok(Self {
            registry,
            source: Arc::new(source),
        })
    }

    #[cfg(not(feature = "sqlite"))]
    fn open_sqlite(
        _cli: &Cli,
        _config: &Config,
        _dataset_path: &std::path::Path,
        _dataset: Dataset,
    ) -> anyhow::Result<Self> {
        anyhow::bail!("SQLite backend not enabled. Rebuild with --features sqlite");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting quarry CLI");

    match &cli.command {
        Commands::Config(args) => commands::config::run(args, &cli.config_path()),
        Commands::Completions(args) => completions::run(args),
        Commands::Export(args) => {
            let config = Config::load(&cli.config_path())?;
            let ctx = AppContext::open(&cli, &config)?;
            export::run(args, &config, &ctx).await
        }
        Commands::Models(args) => {
            let config = Config::load(&cli.config_path())?;
            let ctx = AppContext::open(&cli, &config)?;
            models::run(args, &config, &ctx)
        }
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod output;
mod snapshot;

use crate::config::{AppConfig, ConfigManager};
use crate::output::OutputFormat;
use crate::snapshot::SnapshotStore;
use keysweep_core::Deduplicator;
use keysweep_core::planner::MatchingKeyPlanner;
use keysweep_core::store::{RecordStore, UuidGenerator};

#[derive(Parser)]
#[command(name = "keysweep")]
#[command(author, version, about = "Duplicate and missing global identifier repair for record store exports", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a snapshot directory and repair what the scan finds
    Run {
        /// Snapshot directory to scan
        snapshot: PathBuf,

        /// Report what would change without writing anything back
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show the scan queries a run would issue
    Plan {
        /// Snapshot directory to plan against
        snapshot: PathBuf,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().context("Failed to load configuration")?;

    if !config.output.color_enabled {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Run {
            snapshot,
            dry_run,
            format,
        } => run_command(&config, &snapshot, dry_run, resolve_format(&config, format)).await,
        Commands::Plan { snapshot, format } => {
            plan_command(&config, &snapshot, resolve_format(&config, format)).await
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigCommand::Path => {
                println!("{}", manager.get_config_path().display());
                Ok(())
            }
        },
    }
}

fn resolve_format(config: &AppConfig, arg: Option<OutputFormat>) -> OutputFormat {
    arg.unwrap_or(match config.output.default_format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Text,
    })
}

async fn run_command(
    config: &AppConfig,
    snapshot: &PathBuf,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let store = SnapshotStore::open(snapshot, &config.core.id_field)
        .with_context(|| format!("Failed to open snapshot {}", snapshot.display()))?;
    let ids = UuidGenerator;

    let dedup = Deduplicator::new(&store, &ids, config.core.clone());
    let report = dedup.run().await?;

    if dry_run {
        log::info!("dry run: {} object type(s) left untouched", store.touched());
    } else {
        store.persist().context("Failed to write snapshot back")?;
    }

    output::print_report(&report, format)?;
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

async fn plan_command(config: &AppConfig, snapshot: &PathBuf, format: OutputFormat) -> Result<()> {
    let store = SnapshotStore::open(snapshot, &config.core.id_field)
        .with_context(|| format!("Failed to open snapshot {}", snapshot.display()))?;

    let definitions = store.matching_key_definitions().await?;
    let valid_objects = store.valid_schema_objects().await?;

    let planner = MatchingKeyPlanner::new(&config.core);
    let queries = planner.build_queries(&definitions, &valid_objects);
    output::print_plan(&queries, format)
}

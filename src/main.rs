//! gammawatch - gamma-spectrum ingestion service
//!
//! Entry point for the watcher and the report parsing tool.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use gammawatch::generator::ExternalTool;
use gammawatch::logging::init_tracing;
use gammawatch::pipeline::{Coordinator, PipelineConfig};
use gammawatch::report::parse_report_file;
use gammawatch::storage::{Database, SqliteLedger, SqliteReportStore};
use gammawatch::watcher::{FileWatcher, WatcherConfig, DEFAULT_PATTERN};
use gammawatch::{Config, Error, Result};

/// gammawatch - gamma-spectrum ingestion service
#[derive(Parser, Debug)]
#[command(name = "gammawatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory for the `SQLite` databases
    #[arg(short, long, env = "GAMMAWATCH_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GAMMAWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "GAMMAWATCH_LOG_JSON")]
    log_json: bool,

    /// Directory to watch for spectrum files
    #[arg(short, long, env = "GAMMAWATCH_WATCH_DIR", default_value = "./incoming")]
    watch_dir: PathBuf,

    /// File name glob for spectrum files
    #[arg(short, long, env = "GAMMAWATCH_PATTERN", default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Watch subdirectories too
    #[arg(long, env = "GAMMAWATCH_RECURSIVE", default_value_t = true, action = ArgAction::Set)]
    recursive: bool,

    /// Also import files whose contents change in place
    #[arg(long, env = "GAMMAWATCH_INCLUDE_CHANGES")]
    include_changes: bool,

    /// Milliseconds between queue drains
    #[arg(long, env = "GAMMAWATCH_TICK_MS", default_value = "500")]
    tick_ms: u64,

    /// External analysis tool that writes the report
    #[arg(short, long, env = "GAMMAWATCH_GENERATOR", default_value = "gammareport")]
    generator: PathBuf,

    /// Report template handed to the analysis tool
    #[arg(short, long, env = "GAMMAWATCH_TEMPLATE", default_value = "./report.tpl")]
    template: PathBuf,

    /// Where the analysis tool writes its report [default: <data-dir>/report.txt]
    #[arg(long, env = "GAMMAWATCH_REPORT_OUTPUT")]
    report_output: Option<PathBuf>,

    /// Kill the analysis tool after this many seconds
    #[arg(long, env = "GAMMAWATCH_GENERATOR_TIMEOUT")]
    generator_timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import existing spectra, then watch for new ones (default)
    Run,
    /// Parse a report file and print it as JSON
    Parse {
        /// Report file written by the analysis tool
        report: PathBuf,
    },
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            data_dir: self.data_dir.clone(),
            watch_dir: self.watch_dir.clone(),
            pattern: self.pattern.clone(),
            recursive: self.recursive,
            include_changes: self.include_changes,
            tick_interval: Duration::from_millis(self.tick_ms),
            generator: self.generator.clone(),
            template: self.template.clone(),
            report_output: self.report_output.clone(),
            generator_timeout: self.generator_timeout.map(Duration::from_secs),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    match &cli.command {
        Some(Command::Parse { report }) => print_report(report),
        Some(Command::Run) | None => run(cli.config()).await,
    }
}

fn print_report(path: &Path) -> Result<()> {
    let report = parse_report_file(path)?;
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| Error::internal(format!("failed to serialize report: {e}")))?;
    println!("{json}");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    tracing::info!("gammawatch v{} starting...", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;
    config.check_collaborators()?;

    tracing::info!(
        "Watching {:?}, data in {:?}",
        config.watch_dir,
        config.data_dir
    );

    let ledger = SqliteLedger::new(Database::open(config.ledger_path())?)?;
    let store = SqliteReportStore::new(Database::open(config.database_path())?)?;
    let generator =
        ExternalTool::new(config.resolve_generator()?).with_timeout(config.generator_timeout);
    tracing::info!(generator = %generator.program().display(), "Using report generator");

    let pipeline = PipelineConfig::from_config(&config)?;
    let watcher_config = WatcherConfig {
        root: pipeline.root.clone(),
        filter: pipeline.filter.clone(),
        recursive: config.recursive,
        include_changes: config.include_changes,
    };

    let coordinator = Arc::new(Coordinator::new(
        pipeline,
        Arc::new(ledger),
        Arc::new(generator),
        Arc::new(store),
    ));

    // watch before catching up so nothing dropped in meanwhile is missed
    let watcher = FileWatcher::start(&watcher_config, coordinator.publisher())?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = Arc::clone(&coordinator).run(shutdown).await;

    let watcher_stats = watcher.stats().snapshot();
    tracing::debug!(
        published = watcher_stats.events_published,
        ignored = watcher_stats.events_ignored,
        errors = watcher_stats.errors,
        "Watcher stats"
    );
    if let Err(e) = watcher.stop() {
        tracing::warn!(error = %e, "Failed to stop watcher");
    }

    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

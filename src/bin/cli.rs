//! Sitemon CLI
//!
//! One invocation is one run; schedule it with cron or a systemd timer.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sitemon::{
    config::{self, Settings},
    error::Result,
    models::{Config, RunSummary, TargetStatus},
    pipeline::{self, RunContext, RunOptions},
    services::{self, HttpFetcher},
    storage::{FingerprintStore, SqliteStore},
    utils::short_fingerprint,
};

/// Sitemon - website change watchdog
#[derive(Parser, Debug)]
#[command(
    name = "sitemon",
    version,
    about = "Detect content changes on websites and notify by mail and Telegram"
)]
struct Cli {
    /// Path to the config file; other files resolve relative to it
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every target once
    Run {
        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate config, targets and credentials
    Validate,

    /// Show recorded fingerprints for a target, newest first
    History {
        /// Target name as written in the targets file
        target: String,

        /// Maximum number of records
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Send a test notification through every configured channel
    NotifyTest,
}

/// Initialize logging from the config level, `--verbose` and `RUST_LOG`.
fn init_logging(verbose: bool, config_path: &Path) {
    let level = if verbose {
        "debug".to_string()
    } else {
        Config::load(config_path)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, &cli.config);

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Run { json } => {
            let settings = config::load_all(&cli.config)?;
            let summary = run(&settings).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }

        Command::Validate => {
            let settings = config::load_all(&cli.config)?;
            log::info!("✓ Config OK ({})", cli.config.display());
            log::info!("✓ {} targets OK", settings.targets.len());
            services::build_notifiers(&settings.credentials, &settings.config.notify)?;
            log::info!(
                "✓ Credentials OK (mail: {}, telegram: {})",
                configured(settings.credentials.mail.is_some()),
                configured(settings.credentials.telegram.is_some())
            );
            log::info!("All validations passed!");
            Ok(ExitCode::SUCCESS)
        }

        Command::History { target, limit } => history(&cli.config, &target, limit).await,

        Command::NotifyTest => {
            let settings = config::load_all(&cli.config)?;
            let notifiers =
                services::build_notifiers(&settings.credentials, &settings.config.notify)?;
            if notifiers.is_empty() {
                log::warn!("No notification channel is configured");
                return Ok(ExitCode::from(2));
            }
            let reports =
                services::test_channels(&notifiers, settings.config.notify.timeout()).await;
            Ok(if reports.iter().all(|r| r.is_ok()) {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
    }
}

async fn run(settings: &Settings) -> Result<RunSummary> {
    let store = SqliteStore::open(settings.database_path())?;
    let fetcher = HttpFetcher::new(&settings.config.fetch)?;
    let notifiers = services::build_notifiers(&settings.credentials, &settings.config.notify)?;

    let ctx = RunContext {
        fetcher: &fetcher,
        store: &store,
        notifiers: &notifiers,
        options: RunOptions::from_config(&settings.config),
    };
    let summary = pipeline::run_monitor(&ctx, &settings.targets).await;

    for report in &summary.reports {
        match &report.status {
            TargetStatus::Recorded { outcome, record } => log::debug!(
                "{}: {} ({})",
                report.target,
                outcome.label(),
                short_fingerprint(&record.fingerprint)
            ),
            TargetStatus::FetchFailed { error } => {
                log::warn!("{}: fetch failed: {error}", report.target)
            }
            TargetStatus::StorageFailed { message } => {
                log::warn!("{}: storage failed: {message}", report.target)
            }
            TargetStatus::Skipped => log::warn!("{}: skipped", report.target),
        }
    }

    log::info!("Closing database {}", store.location().display());
    store.close()?;
    Ok(summary)
}

/// Print stored records; needs only the config and the database.
async fn history(config_path: &Path, target: &str, limit: usize) -> Result<ExitCode> {
    let store = SqliteStore::open(config::database_path(config_path)?)?;
    let records = store.history(target, limit).await?;
    if records.is_empty() {
        log::info!("No records for {target}");
    }
    for record in &records {
        println!("{}  {}", record.observed_at.to_rfc3339(), record.fingerprint);
    }
    store.close()?;
    Ok(ExitCode::SUCCESS)
}

fn configured(present: bool) -> &'static str {
    if present { "configured" } else { "not configured" }
}

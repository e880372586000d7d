//! flatscan CLI
//!
//! Watches the configured housing sites and posts new listings to Telegram.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use flatscan::{
    error::Result,
    models::Config,
    notify::{LogNotifier, Notifier, TelegramNotifier, render_message},
    pipeline::{self, CycleOptions, Orchestrator},
    services::{self, FetchContext},
    storage::{FileIdentityStore, MemoryIdentityStore, local::read_snapshot},
    utils::http,
};

/// flatscan - Berlin apartment listing watcher
#[derive(Parser, Debug)]
#[command(
    name = "flatscan",
    version,
    about = "Announces new Berlin apartment listings on Telegram"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "flatscan.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan on an interval until interrupted
    Run,

    /// Run a single scan cycle
    Once,

    /// Fetch and list new listings without notifying or recording them
    Scan,

    /// Validate configuration
    Validate,

    /// Show identity store info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn fetch_context(config: &Config) -> Result<FetchContext> {
    Ok(FetchContext {
        client: http::create_async_client(&config.scanner)?,
        attempts: config.scanner.fetch_attempts,
    })
}

/// Build the orchestrator for `run` and `once`.
async fn live_orchestrator(config: &Config) -> Result<Orchestrator<FileIdentityStore>> {
    config.validate()?;

    let store = FileIdentityStore::load(&config.store.path).await?;
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::from_config(&config.telegram)?);
    let adapters = services::build_adapters(config, &fetch_context(config)?);
    log::info!(
        "Sources: {}",
        adapters
            .iter()
            .map(|a| a.source())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let orchestrator = Orchestrator::new(
        adapters,
        store,
        notifier,
        CycleOptions::from_config(config),
    );
    Ok(match TelegramNotifier::alerts(&config.telegram)? {
        Some(alerts) => orchestrator.with_alerts(Arc::new(alerts)),
        None => orchestrator,
    })
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("flatscan starting...");

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();

    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run => {
            let mut orchestrator = live_orchestrator(&config).await?;
            let shutdown = pipeline::shutdown_channel();
            pipeline::run_loop(&mut orchestrator, config.scanner.interval(), shutdown).await;
        }

        Command::Once => {
            let mut orchestrator = live_orchestrator(&config).await?;
            let report = orchestrator.run_cycle().await?;
            log::info!("{report}");
        }

        Command::Scan => {
            let known = read_snapshot(&config.store.path)
                .await?
                .map(|s| s.into_map().into_keys().collect::<Vec<_>>())
                .unwrap_or_default();
            let store = MemoryIdentityStore::with_keys(known);
            let adapters = services::build_adapters(&config, &fetch_context(&config)?);
            let orchestrator = Orchestrator::new(
                adapters,
                store,
                Arc::new(LogNotifier),
                CycleOptions::from_config(&config),
            );

            let (diff, report) = orchestrator.scan().await;
            for listing in &diff.new {
                println!("{}\n", render_message(listing));
            }
            log::info!("{report}");
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({:?})", config.telegram);

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Store: {}", config.store.path.display());
            match read_snapshot(&config.store.path).await? {
                Some(snapshot) => {
                    log::info!("Known listings: {}", snapshot.entries.len());
                    log::info!("Last updated: {}", snapshot.updated_at);
                    for source in config.enabled_sources() {
                        let count = snapshot
                            .entries
                            .iter()
                            .filter(|e| e.source == source.kind.key())
                            .count();
                        log::info!("  {}: {}", source.kind.display_name(), count);
                    }
                }
                None => log::info!("No store file found yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}

//! volleysync command-line interface

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use volleysync::config::load_config;
use volleysync::fetch::{
    build_http_client, CitySource, FederationSource, HttpCitySource, HttpFederationSource,
};
use volleysync::jobs::{JobController, JobDeps, JobMode, JobSettings, JobState};
use volleysync::pipeline::StepName;
use volleysync::resolver::EntityResolver;
use volleysync::storage::{Source, SqliteStore, Store};
use volleysync::updater::{AutoUpdater, UpdaterSettings};

#[derive(Parser)]
#[command(name = "volleysync", version, about = "Incremental volleyball data sync")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "volleysync.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan past the newest confirmed city match for new ones
    Scan,

    /// Fetch every identifier gap below the newest confirmed city match
    Backfill,

    /// First run: find the city identifier ceiling, then backfill up to it
    Bootstrap,

    /// Re-parse a closed city identifier range
    Range {
        start: u32,
        end: u32,
        /// Also re-fetch identifiers that are already stored
        #[arg(long)]
        refetch: bool,
    },

    /// Parse city roster pages over a closed identifier range
    Rosters { start: u32, end: u32 },

    /// Run the federation pipeline for one season
    Season {
        number: u32,
        /// Run only this step; candidates come from the store
        #[arg(long, value_enum)]
        step: Option<StepName>,
        /// Re-fetch matches that already have statistics
        #[arg(long)]
        refetch: bool,
    },

    /// Run the federation pipeline over an inclusive span of seasons
    Seasons { first: u32, last: u32 },

    /// Merge player rows that share last name, first name and birth date
    MergeDups {
        #[arg(long, value_enum, default_value = "federation")]
        source: Source,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the background auto-updater until interrupted
    Watch,

    /// Print database row counts
    Stats,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let store = Arc::new(Mutex::new(
        SqliteStore::open(&config.database.path)
            .with_context(|| format!("opening {}", config.database.path.display()))?,
    ));

    // Commands that only touch the database
    match &cli.command {
        Command::Stats => {
            let counts = {
                let store = store.lock().expect("store lock poisoned");
                store.counts()?
            };
            println!("{}", serde_json::to_string_pretty(&counts)?);
            return Ok(());
        }
        Command::MergeDups { source, dry_run } => {
            let report = {
                let mut store = store.lock().expect("store lock poisoned");
                EntityResolver::new(&mut *store).merge_duplicate_players(*source, *dry_run)?
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        _ => {}
    }

    let client = build_http_client(&config.http.user_agent, config.http.timeout_secs)
        .context("building HTTP client")?;
    let city: Arc<dyn CitySource> = Arc::new(HttpCitySource::new(
        client.clone(),
        config.city.parsed_base_url()?,
        config.city.min_interval(),
    ));
    let federation: Arc<dyn FederationSource> = Arc::new(HttpFederationSource::new(
        client,
        config.federation.parsed_base_url()?,
        config.federation.min_interval(),
    ));

    let controller = Arc::new(JobController::new(JobDeps {
        store: Arc::clone(&store),
        city,
        federation: Arc::clone(&federation),
        settings: JobSettings {
            empty_streak_threshold: config.discovery.empty_streak_threshold,
            bootstrap_start: config.discovery.bootstrap_start,
            bootstrap_step: config.discovery.bootstrap_step,
        },
    }));

    let mode = match cli.command {
        Command::Scan => JobMode::FrontierScan,
        Command::Backfill => JobMode::Backfill,
        Command::Bootstrap => JobMode::Bootstrap,
        Command::Range {
            start,
            end,
            refetch,
        } => JobMode::Range {
            start,
            end,
            refetch,
        },
        Command::Rosters { start, end } => JobMode::Rosters { start, end },
        Command::Season {
            number,
            step,
            refetch,
        } => JobMode::Season {
            number,
            step,
            refetch,
        },
        Command::Seasons { first, last } => JobMode::Seasons { first, last },
        Command::Watch => {
            return watch(
                controller,
                federation,
                store,
                UpdaterSettings {
                    warmup: config.updater.warmup(),
                    interval: config.updater.interval(),
                },
            )
            .await;
        }
        Command::Stats | Command::MergeDups { .. } => unreachable!("handled above"),
    };

    run_job(controller, mode).await
}

/// Runs one job to completion, stopping cooperatively on Ctrl-C
async fn run_job(
    controller: Arc<JobController<SqliteStore>>,
    mode: JobMode,
) -> anyhow::Result<()> {
    controller.start(mode)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping job");
                controller.stop().await;
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(300)) => {
                if !controller.is_active() {
                    break;
                }
            }
        }
    }

    let snapshot = controller.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if snapshot.state == JobState::Failed {
        anyhow::bail!(
            "job failed: {}",
            snapshot.last_error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

/// Runs the auto-updater until Ctrl-C
async fn watch(
    controller: Arc<JobController<SqliteStore>>,
    federation: Arc<dyn FederationSource>,
    store: Arc<Mutex<SqliteStore>>,
    settings: UpdaterSettings,
) -> anyhow::Result<()> {
    let updater = Arc::new(AutoUpdater::new(
        Arc::clone(&controller),
        federation,
        store,
        settings,
    ));

    let runner = {
        let updater = Arc::clone(&updater);
        tokio::spawn(async move { updater.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("interrupt received; shutting down");
    updater.request_stop();
    controller.stop().await;
    let _ = runner.await;

    println!("{}", serde_json::to_string_pretty(&updater.status())?);
    Ok(())
}

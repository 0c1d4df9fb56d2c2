//! Circuit breaker CLI (v1)
//!
//! Drives breakers declared in a TOML config file against their object
//! stores. Every command is one locked operation on the shared state, so the
//! CLI can be run alongside any other process using the same stores.
//!
//! # Architecture Overview
//!
//! ```text
//!     breaker.toml ──▶ config loader ──▶ BreakerRegistry ──▶ CircuitBreaker
//!                           ▲                                     │
//!                           │ (monitor only)                      ▼
//!                      ConfigWatcher                     CircuitBreakerEngine
//!                                                          │            │
//!                                                          ▼            ▼
//!                                                   LockProvider   StateStore
//!                                                   (local/file)   (memory/file)
//! ```
//!
//! # Exit Codes
//! - 0: success
//! - 1: configuration, store or lock failure
//! - 2: `filter` found the breaker open

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use circuit_breaker::breaker::{
    BreakerError, BreakerRegistry, BreakerStatus, CircuitBreaker, CircuitBreakerEngine, TripOutcome,
};
use circuit_breaker::config::{load_config, watcher::ConfigWatcher, AppConfig};
use circuit_breaker::lifecycle::{shutdown_on_signal, Shutdown};
use circuit_breaker::observability::{logging::init_logging, metrics};
use circuit_breaker::store::StoreManager;

const EXIT_OPEN: u8 = 2;

#[derive(Parser)]
#[command(name = "breaker")]
#[command(about = "Inspect and drive shared-state circuit breakers", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "breaker.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a breaker's configuration as JSON
    Dump {
        #[arg(short, long)]
        breaker: String,
    },
    /// Record one failure
    Trip {
        #[arg(short, long)]
        breaker: String,
        /// Only count the failure if the observed type matches
        #[arg(long)]
        error_type: Option<String>,
        /// Error type of the failure being recorded
        #[arg(long)]
        observed: Option<String>,
    },
    /// Ask whether a call may proceed (exit code 2 when open)
    Filter {
        #[arg(short, long)]
        breaker: String,
    },
    /// Show persisted state for one or all breakers
    Status {
        #[arg(short, long)]
        breaker: Option<String>,
    },
    /// Close a breaker and clear its counters
    Reset {
        #[arg(short, long)]
        breaker: String,
    },
    /// Poll breaker state until interrupted, reloading config on change
    Monitor {
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.logging);

    tracing::debug!(
        path = %cli.config.display(),
        breakers = config.breakers.len(),
        stores = config.stores.len(),
        "Configuration loaded"
    );

    let engine = Arc::new(CircuitBreakerEngine::from_config(
        &config,
        StoreManager::global().clone(),
    )?);
    let registry = BreakerRegistry::new(engine.clone(), &config.breakers);

    match cli.command {
        Commands::Dump { breaker } => {
            let breaker = lookup(&registry, &breaker)?;
            println!("{}", breaker.dump_config_json()?);
        }
        Commands::Trip {
            breaker,
            error_type,
            observed,
        } => {
            let breaker = lookup(&registry, &breaker)?;
            match breaker.trip(error_type.as_deref(), observed.as_deref())? {
                TripOutcome::Ignored => println!("{}: failure ignored", breaker.name()),
                TripOutcome::Counted {
                    failure_count,
                    state,
                    ..
                } => println!("{}: {} failure(s), {}", breaker.name(), failure_count, state),
            }
        }
        Commands::Filter { breaker } => {
            let breaker = lookup(&registry, &breaker)?;
            match breaker.filter() {
                Ok(state) => println!("{}: allowed ({})", breaker.name(), state),
                Err(BreakerError::Open { retry_after, .. }) => {
                    match retry_after {
                        Some(wait) => println!(
                            "{}: open, retry in {}ms",
                            breaker.name(),
                            wait.as_millis()
                        ),
                        None => println!("{}: open", breaker.name()),
                    }
                    return Ok(ExitCode::from(EXIT_OPEN));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Status { breaker } => {
            let statuses = match breaker {
                Some(name) => vec![lookup(&registry, &name)?.status()?],
                None => collect_statuses(&registry)?,
            };
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        Commands::Reset { breaker } => {
            let breaker = lookup(&registry, &breaker)?;
            let previous = breaker.reset()?;
            println!("{}: {} -> CLOSED", breaker.name(), previous);
        }
        Commands::Monitor { interval_secs } => {
            monitor(cli.config, config, engine, registry, interval_secs).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn lookup(registry: &BreakerRegistry, name: &str) -> Result<CircuitBreaker, String> {
    registry.get(name).ok_or_else(|| {
        format!(
            "unknown breaker '{}' (configured: {})",
            name,
            registry.names().join(", ")
        )
    })
}

fn collect_statuses(registry: &BreakerRegistry) -> Result<Vec<BreakerStatus>, BreakerError> {
    registry.all().iter().map(CircuitBreaker::status).collect()
}

async fn monitor(
    path: PathBuf,
    config: AppConfig,
    engine: Arc<CircuitBreakerEngine>,
    registry: BreakerRegistry,
    interval_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.metrics.enabled {
        match config.metrics.address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.metrics.address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    let mut signal = shutdown.subscribe();

    let (watcher, mut updates) = ConfigWatcher::new(&path);
    // Dropping the handle stops the watch
    let _watch = watcher.run()?;

    let registry = Arc::new(registry);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    tracing::info!(
        breakers = registry.len(),
        interval_secs,
        "Monitoring breakers"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let registry = registry.clone();
                // Store and lock access may block on disk
                tokio::task::spawn_blocking(move || poll(&registry)).await?;
            }
            Some(next) = updates.recv() => {
                let opener = engine.clone();
                let stores = next.stores.clone();
                let opened = tokio::task::spawn_blocking(move || opener.register_stores(&stores)).await?;
                if let Err(e) = opened {
                    tracing::error!(error = %e, "Failed to open stores from reloaded config");
                    continue;
                }
                if next.locks != config.locks {
                    tracing::warn!("Lock settings changed; restart to apply them");
                }
                registry.reload(&next.breakers);
            }
            _ = signal.recv() => break,
        }
    }

    tracing::info!("Monitor stopped");
    Ok(())
}

fn poll(registry: &BreakerRegistry) {
    for breaker in registry.all() {
        match breaker.status() {
            Ok(status) => {
                metrics::record_state(breaker.name(), status.record.state);
                tracing::info!(
                    breaker = %status.breaker_name,
                    state = %status.record.state,
                    failure_count = status.record.failure_count,
                    failure_point = ?status.record.failure_window_start,
                    "Breaker status"
                );
            }
            Err(e) => tracing::warn!(breaker = %breaker.name(), error = %e, "Failed to read breaker status"),
        }
    }
}

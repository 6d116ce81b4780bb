use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use price_scout::browser::{BrowserSessionManager, HeadlessChromeBackend, SessionSettings};
use price_scout::config::AppConfig;
use price_scout::models::Product;
use price_scout::orchestrator::{OrchestratorSettings, PriceOrchestrator};
use price_scout::rate_limiter::RateLimiter;
use price_scout::scheduler::MaintenanceScheduler;
use price_scout::store::{RequestMeta, SqliteStore};
use price_scout::suppliers::SupplierRegistry;
use price_scout::telemetry;
use price_scout::web::{self, AppState};

#[derive(Parser)]
#[command(name = "price-scout", version, about = "Safety-supply price comparison across Canadian suppliers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Fetch prices for one product from every supplier and print the JSON result
    Fetch {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        part_number: String,
        #[arg(long)]
        size: Option<String>,
    },
    /// Run one supplier's scraper in diagnostic mode
    Probe {
        supplier: String,
        #[arg(long, default_value = "3M")]
        brand: String,
        #[arg(long, default_value = "2091")]
        part_number: String,
        #[arg(long)]
        size: Option<String>,
    },
}

struct Runtime {
    config: AppConfig,
    sessions: Arc<BrowserSessionManager>,
    store: Option<Arc<SqliteStore>>,
    orchestrator: Arc<PriceOrchestrator>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init_tracing(&config.logging)?;
    telemetry::init_metrics(&config.metrics)?;

    info!("Starting Price Scout v{}", env!("CARGO_PKG_VERSION"));
    let runtime = build_runtime(config).await;

    let outcome = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&runtime).await,
        Command::Fetch {
            brand,
            part_number,
            size,
        } => until_interrupted(fetch(&runtime, product(brand, part_number, size)), shutdown_signal()).await,
        Command::Probe {
            supplier,
            brand,
            part_number,
            size,
        } => until_interrupted(probe(&runtime, &supplier, product(brand, part_number, size)), shutdown_signal()).await,
    };

    runtime.sessions.shutdown().await;
    outcome
}

async fn build_runtime(config: AppConfig) -> Runtime {
    let backend = Arc::new(HeadlessChromeBackend::new(&config.browser));
    let sessions = Arc::new(BrowserSessionManager::new(backend, SessionSettings::from(&config.browser)));
    let registry = SupplierRegistry::with_builtin(Arc::clone(&sessions), config.scraper.retry_policy());

    let store = if config.database.enabled {
        match SqliteStore::connect(&config.database.url, config.database.max_connections).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "Database unavailable, prices will not be persisted");
                None
            }
        }
    } else {
        info!("Database disabled");
        None
    };

    let mut orchestrator = PriceOrchestrator::new(registry, OrchestratorSettings::from(&config.orchestrator));
    if let Some(store) = &store {
        orchestrator = orchestrator
            .with_directory(store.clone())
            .with_store(store.clone())
            .with_audit(store.clone());
    }

    Runtime {
        config,
        sessions,
        store,
        orchestrator: Arc::new(orchestrator),
    }
}

async fn serve(runtime: &Runtime) -> Result<()> {
    let rate_limiter = Arc::new(RateLimiter::from_config(&runtime.config.rate_limit));

    let mut scheduler = MaintenanceScheduler::new(Arc::clone(&rate_limiter), Arc::clone(&runtime.sessions)).await?;
    scheduler.schedule_defaults(&runtime.config).await?;
    scheduler.start().await?;

    let state = AppState {
        orchestrator: Arc::clone(&runtime.orchestrator),
        store: runtime.store.clone(),
        rate_limiter,
        sessions: Arc::clone(&runtime.sessions),
        config: runtime.config.clone(),
    };

    web::serve(state, shutdown_signal()).await?;

    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler did not shut down cleanly");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn fetch(runtime: &Runtime, product: Product) -> Result<()> {
    let response = runtime
        .orchestrator
        .fetch_all_prices(&product, &RequestMeta::default())
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn probe(runtime: &Runtime, supplier: &str, product: Product) -> Result<()> {
    let site = runtime
        .orchestrator
        .registry()
        .site(supplier)
        .ok_or_else(|| anyhow::anyhow!("Unknown supplier: {}", supplier))?;
    let report = site.probe(&product).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Runs a one-shot command, abandoning it when `interrupt` fires so the
/// browser can still be shut down.
async fn until_interrupted<T>(work: impl Future<Output = Result<T>>, interrupt: impl Future<Output = ()>) -> Result<T> {
    tokio::select! {
        result = work => result,
        () = interrupt => {
            warn!("Interrupted before the command finished");
            Err(anyhow::anyhow!("Interrupted"))
        }
    }
}

fn product(brand: String, part_number: String, size: Option<String>) -> Product {
    Product {
        brand,
        part_number,
        size,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, starting graceful shutdown");
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use housing_hunter::heartbeat::HeartbeatInterval;
use housing_hunter::store::PgDeliveryRepository;
use housing_hunter::tenants::PgTenantStore;
use housing_hunter::{AppContext, Config, Scheduler, ShutdownSignal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Crawl listing sites for every paying tenant and notify new listings.
#[derive(Debug, Parser)]
#[command(name = "housing-hunter", version)]
struct Args {
    /// Path to the YAML configuration
    #[arg(short, long, default_value = "config.yaml", env = "HUNTER_CONFIG")]
    config: PathBuf,

    /// Send an operator heartbeat every hour, day or week
    #[arg(long, value_enum)]
    heartbeat: Option<HeartbeatInterval>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("housing_hunter={default_level},sqlx=warn").into()),
        )
        .init();

    config.validate().context("Invalid configuration")?;
    info!(config = %args.config.display(), "configuration loaded");

    let database_url = config
        .database_url()
        .context("database url missing")?
        .to_string();
    let pool = PgDeliveryRepository::connect(&database_url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    let deliveries = PgDeliveryRepository::new(pool.clone());
    deliveries.migrate().await.context("Failed to run migrations")?;

    let once = args.once || !config.run_loop.active;
    let ctx = AppContext::new(config, Arc::new(deliveries))?;
    let heartbeat = ctx.heartbeat(args.heartbeat)?;

    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received, finishing current tenant");
        trigger.trigger();
    });

    let mut scheduler = Scheduler::new(
        ctx.config.clone(),
        Arc::new(PgTenantStore::new(pool)),
        ctx.hunter.clone(),
        shutdown,
    );
    if let Some(heartbeat) = heartbeat {
        scheduler = scheduler.with_heartbeat(heartbeat);
    }

    scheduler.run(once).await;
    info!("housing-hunter exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
                return;
            }
            Err(e) => warn!(error = %e, "failed to register SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl_c, running until killed");
        std::future::pending::<()>().await;
    }
}

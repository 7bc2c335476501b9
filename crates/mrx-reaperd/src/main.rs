//! mrx-reaperd entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config,
//! wires the Postgres stores into an allocator, and runs the reaper loop
//! until ctrl-c. Shutdown goes through the reaper's watch channel so the
//! loop stops between groups, never mid-group.
//!
//! Order cancellation requires the storefront's order service; deployments
//! that colocate it swap [`NullOrderService`] for a real client. With the
//! null service the daemon still clears expired overlays on schedule.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mrx_allocator::{Allocator, SystemClock};
use mrx_db::{PgCatalogStore, PgReservationStore};
use mrx_reaper::{NullOrderService, Reaper};
use tokio::sync::watch;
use tracing::info;

const ENV_CONFIG_PATHS: &str = "MRX_CONFIG_PATHS";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = load_config()?;

    let pool = mrx_db::connect_from_env().await?;
    let status = mrx_db::status(&pool).await?;
    anyhow::ensure!(
        status.has_variants_table,
        "inventory schema missing; run `mrx db migrate` first"
    );

    let reservations = Arc::new(PgReservationStore::new(pool.clone()));
    let clock = Arc::new(SystemClock);
    let allocator = Arc::new(
        Allocator::new(
            Arc::new(PgCatalogStore::new(pool)),
            reservations.clone(),
            clock.clone(),
        )
        .with_max_retries(config.allocator.max_retries),
    );

    let reaper = Arc::new(Reaper::new(
        allocator,
        reservations,
        Arc::new(NullOrderService),
        clock,
        Duration::from_secs(config.reaper.sweep_interval_secs),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = {
        let reaper = Arc::clone(&reaper);
        tokio::spawn(async move { reaper.run(shutdown_rx).await })
    };

    info!(
        sweep_interval_secs = config.reaper.sweep_interval_secs,
        "mrx-reaperd running; ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await.context("ctrl-c handler failed")?;
    info!("shutdown requested; letting the current group finish");
    let _ = shutdown_tx.send(true);

    loop_handle.await.context("reaper loop panicked")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Load layered config from MRX_CONFIG_PATHS (comma-separated, merge order),
/// falling back to defaults when unset.
fn load_config() -> anyhow::Result<mrx_config::EngineConfig> {
    match std::env::var(ENV_CONFIG_PATHS) {
        Ok(paths) if !paths.trim().is_empty() => {
            let parts: Vec<&str> = paths.split(',').map(str::trim).collect();
            let loaded = mrx_config::load_layered(&parts)?;
            info!(config_hash = %loaded.config_hash, "config loaded");
            Ok(loaded.engine)
        }
        _ => {
            info!("{ENV_CONFIG_PATHS} not set; using built-in defaults");
            Ok(mrx_config::EngineConfig::default())
        }
    }
}

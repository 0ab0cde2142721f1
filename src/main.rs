// =============================================================================
// Vela Sentiment Arena - worker entry point
// =============================================================================
//
// One process, one configuration file, one generated instance id. The
// configuration file is named by VELA_CONFIG_FILE (set by the fleet launcher)
// and read exactly once; every component receives its values explicitly.
// =============================================================================

use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vela_bot::fleet::CONFIG_FILE_ENV;
use vela_bot::worker::{run_worker, WorkerContext};
use vela_bot::worker_config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Vela Sentiment Arena worker starting up");

    // Read once at startup; nothing else consults the environment.
    let config_file = std::env::var(CONFIG_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("worker-default.json"));

    let config = WorkerConfig::load(&config_file).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load worker config, using defaults");
        WorkerConfig::default()
    });

    let ctx = WorkerContext::new(config, &config_file)?;
    info!(
        instance_id = %ctx.instance_id,
        config_file = %ctx.config_file_stem,
        market = %ctx.config.market,
        cycle_secs = ctx.config.trade_cycle_interval_secs,
        "worker context initialised"
    );

    let worker = tokio::spawn(run_worker(ctx));

    // Run until the process is told to stop. An in-flight cycle interrupted
    // here simply produces no observation for its tick.
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping");
    worker.abort();

    Ok(())
}

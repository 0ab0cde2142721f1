// =============================================================================
// Fleet Launcher - spawn one worker per configuration file, then exit
// =============================================================================

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vela_bot::fleet::launch_fleet;

fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let working_dir = std::env::current_dir().context("failed to resolve working directory")?;
    info!(dir = %working_dir.display(), "scanning for worker config files");

    // Fire and forget: the workers outlive this process, and finding nothing
    // to launch is a clean exit.
    let handles = launch_fleet(&working_dir)?;
    info!(launched = handles.len(), "launcher done");

    Ok(())
}

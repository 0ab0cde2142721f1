// =============================================================================
// Winner Selector - rank all performance records, archive the top five
// =============================================================================

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::EnvFilter;

use vela_bot::winners::{select_winners, DEFAULT_TOP_K};

fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let log_dir = PathBuf::from("log");
    let archive = select_winners(&log_dir, DEFAULT_TOP_K)?;

    info!(path = %archive.display(), "analysis complete");
    Ok(())
}

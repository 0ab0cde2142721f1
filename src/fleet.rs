// =============================================================================
// Worker Fleet Launcher - one detached process per configuration file
// =============================================================================
//
// The launcher scans a directory for sweep configuration files and starts one
// worker process per file, then gets out of the way. It never waits on its
// children: workers outlive the launcher and log their own lifecycle, tagged
// with their originating file. A spawn failure is logged and the rest of the
// fleet still launches.
// =============================================================================

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use tracing::{error, info};

/// Naming convention for sweep configuration files.
pub const CONFIG_FILE_PREFIX: &str = "worker-";
pub const CONFIG_FILE_SUFFIX: &str = ".json";

/// Environment variable naming the configuration file a worker is bound to.
pub const CONFIG_FILE_ENV: &str = "VELA_CONFIG_FILE";

/// Worker binary, expected next to the launcher executable.
pub const WORKER_BINARY: &str = "vela-bot";

/// A launched worker. The child is deliberately never awaited here; it is
/// kept so embedders that do want to reap their fleet can.
pub struct WorkerHandle {
    pub config_file: PathBuf,
    pub pid: u32,
    pub child: Child,
}

/// Configuration-file candidates in `dir`, by naming convention, sorted.
pub fn discover_config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.context("failed to read directory entry")?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(CONFIG_FILE_PREFIX) && name.ends_with(CONFIG_FILE_SUFFIX) {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Spawn one detached worker bound to `config_path`. Do not await it.
pub fn launch_worker(config_path: &Path) -> Result<WorkerHandle> {
    let launcher = std::env::current_exe().context("failed to resolve launcher executable")?;
    let worker_bin = launcher.with_file_name(WORKER_BINARY);

    let child = Command::new(&worker_bin)
        .env(CONFIG_FILE_ENV, config_path)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| {
            format!(
                "failed to spawn {} for {}",
                worker_bin.display(),
                config_path.display()
            )
        })?;

    let pid = child.id();
    info!(config_file = %config_path.display(), pid, "worker launched");

    Ok(WorkerHandle {
        config_file: config_path.to_path_buf(),
        pid,
        child,
    })
}

/// Launch one worker per configuration file found in `working_dir`.
///
/// An empty scan is a clean no-op, not an error. Spawn failures are logged
/// per file and skipped.
pub fn launch_fleet(working_dir: &Path) -> Result<Vec<WorkerHandle>> {
    let configs = discover_config_files(working_dir)?;

    if configs.is_empty() {
        info!(
            dir = %working_dir.display(),
            "no worker config files found, nothing to launch"
        );
        return Ok(Vec::new());
    }

    let mut handles = Vec::new();
    for config in &configs {
        match launch_worker(config) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!(config_file = %config.display(), error = %e, "failed to launch worker");
            }
        }
    }

    info!(
        found = configs.len(),
        launched = handles.len(),
        "fleet launch complete"
    );
    Ok(handles)
}

// =============================================================================
// Tests
// =============================================================================

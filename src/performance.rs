// =============================================================================
// Configuration-Performance Recorder
// =============================================================================
//
// Pairs a worker's redacted configuration with its latest evaluation and
// persists the result as one JSON object per (config file, worker instance):
//
//   log/performance/performance-{configFileStem}-{instanceId}.json
//
// The record is overwritten in place on every evaluation so it always holds
// the cumulative latest state; only `startDate` survives from the first
// write. Writes go through a tmp sibling plus rename so the winner scan never
// observes a half-written record.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::evaluator::Evaluation;
use crate::worker_config::WorkerConfig;

/// Name of the performance sub-directory under the log root.
pub const PERFORMANCE_DIR: &str = "performance";

/// Latest cumulative evaluation result for one (worker, config file) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    /// Order-stable identifier of the non-secret numeric configuration.
    pub fingerprint: String,
    pub guess_ratio: f64,
    pub checks: u64,
    /// RFC 3339; fixed at the first write for this pair.
    pub start_date: String,
    /// RFC 3339; updated on every write.
    pub end_date: String,
    /// The configuration with credentials removed.
    pub configuration: serde_json::Map<String, serde_json::Value>,
}

/// Path of the record owned by one (config file, instance) pair.
pub fn record_path(log_dir: &Path, config_file_stem: &str, instance_id: &str) -> PathBuf {
    log_dir
        .join(PERFORMANCE_DIR)
        .join(format!("performance-{config_file_stem}-{instance_id}.json"))
}

/// Persist the latest evaluation for this worker, overwriting any prior
/// record at the same path.
pub fn record_performance(
    log_dir: &Path,
    config_file_stem: &str,
    instance_id: &str,
    evaluation: &Evaluation,
    config: &WorkerConfig,
) -> Result<PathBuf> {
    let path = record_path(log_dir, config_file_stem, instance_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let now = Utc::now().to_rfc3339();
    let start_date = prior_start_date(&path).unwrap_or_else(|| now.clone());

    let record = PerformanceRecord {
        fingerprint: config.fingerprint(),
        guess_ratio: evaluation.guess_ratio,
        checks: evaluation.checks,
        start_date,
        end_date: now,
        configuration: config.redacted(),
    };

    let content = serde_json::to_string_pretty(&record)
        .context("failed to serialise performance record")?;

    // Atomic overwrite: tmp sibling, then rename.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write tmp record to {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("failed to rename tmp record to {}", path.display()))?;

    debug!(
        path = %path.display(),
        guess_ratio = evaluation.guess_ratio,
        checks = evaluation.checks,
        "performance record written"
    );

    Ok(path)
}

/// `startDate` of the record already at `path`, if one parses.
fn prior_start_date(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<PerformanceRecord>(&content) {
        Ok(prior) => Some(prior.start_date),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "prior performance record unreadable, restarting its date range"
            );
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

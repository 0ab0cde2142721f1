// =============================================================================
// Winner Selector - fleet-wide ranking of performance records
// =============================================================================
//
// Scans every performance folder under the log root, parses whatever records
// it can, ranks them, and writes the top K as an immutable, timestamped
// archive under log/winners/. One malformed record never aborts the scan;
// it is logged and skipped. The selector only reads records that workers
// write atomically, so running it mid-sweep is safe.
// =============================================================================

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::performance::PerformanceRecord;

/// How many records the archive keeps by default.
pub const DEFAULT_TOP_K: usize = 5;

/// Sub-directory name marker for record folders under the log root.
pub const PERFORMANCE_FOLDER_MARKER: &str = "performance";

/// Name of the archive sub-directory under the log root.
pub const WINNERS_DIR: &str = "winners";

/// Rank records in place: guess ratio descending, ties to the record with
/// more checks. A NaN ratio sorts below every number.
pub fn rank_records(records: &mut [PerformanceRecord]) {
    fn ratio_key(record: &PerformanceRecord) -> f64 {
        if record.guess_ratio.is_nan() {
            f64::NEG_INFINITY
        } else {
            record.guess_ratio
        }
    }

    records.sort_by(|a, b| {
        ratio_key(b)
            .total_cmp(&ratio_key(a))
            .then_with(|| b.checks.cmp(&a.checks))
    });
}

/// Scan `log_dir`, rank everything found, and write the top `top_k` records
/// to a new timestamped archive. Returns the archive path.
pub fn select_winners(log_dir: &Path, top_k: usize) -> Result<PathBuf> {
    let mut records = collect_performance_records(log_dir)?;
    info!(count = records.len(), "performance records collected");

    rank_records(&mut records);
    records.truncate(top_k);

    let winners_dir = log_dir.join(WINNERS_DIR);
    std::fs::create_dir_all(&winners_dir)
        .with_context(|| format!("failed to create {}", winners_dir.display()))?;

    let file_name = format!("winners-{}.json", Local::now().format("%d-%m-%Y:%H:%M:%S"));
    let path = winners_dir.join(file_name);

    // A prior archive is never overwritten, whatever its content.
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("failed to create winners archive {}", path.display()))?;

    let content =
        serde_json::to_string_pretty(&records).context("failed to serialise winners archive")?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write winners archive {}", path.display()))?;

    info!(path = %path.display(), winners = records.len(), "winners archive written");
    Ok(path)
}

/// Every parseable record in every performance folder under `log_dir`.
fn collect_performance_records(log_dir: &Path) -> Result<Vec<PerformanceRecord>> {
    let entries = std::fs::read_dir(log_dir)
        .with_context(|| format!("failed to read log directory {}", log_dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.context("failed to read log directory entry")?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.contains(PERFORMANCE_FOLDER_MARKER) {
            continue;
        }

        collect_records_in_folder(&entry.path(), &mut records)?;
    }

    Ok(records)
}

fn collect_records_in_folder(folder: &Path, records: &mut Vec<PerformanceRecord>) -> Result<()> {
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("failed to read performance folder {}", folder.display()))?;

    for entry in entries {
        let entry = entry.context("failed to read performance folder entry")?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        match parse_record(&path) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %e,
                    "skipping unreadable performance record"
                );
            }
        }
    }

    Ok(())
}

fn parse_record(path: &Path) -> Result<PerformanceRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

// =============================================================================
// Tests
// =============================================================================

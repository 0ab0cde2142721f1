// =============================================================================
// Worker Configuration - one JSON file per sweep experiment
// =============================================================================
//
// Every tunable knob of a worker lives here and is read exactly once at
// process startup; components receive values explicitly instead of consulting
// the environment. All fields carry serde defaults so that a sweep file only
// needs to name the knobs it varies.
//
// Credential redaction and the configuration fingerprint are pure functions
// kept at this boundary: nothing outside this module decides what counts as
// a secret.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_market() -> String {
    "BTC-EUR".to_string()
}

fn default_order_book_depth() -> u64 {
    25
}

fn default_sentiment_threshold() -> f64 {
    55.0
}

fn default_min_difference_for_analysis() -> f64 {
    0.005
}

fn default_max_difference_for_hold() -> f64 {
    0.01
}

fn default_hours_to_keep_observations() -> u64 {
    24
}

fn default_trade_cycle_interval_secs() -> u64 {
    300
}

fn default_store_path() -> String {
    "log/observations.db".to_string()
}

fn default_log_dir() -> String {
    "log".to_string()
}

fn default_book_api_url() -> String {
    "https://api.bitvavo.com/v2".to_string()
}

// =============================================================================
// WorkerConfig
// =============================================================================

/// Configuration for a single sweep worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Market the worker observes (exchange notation, e.g. "BTC-EUR").
    #[serde(default = "default_market")]
    pub market: String,

    /// Order book levels per side requested from the exchange.
    #[serde(default = "default_order_book_depth")]
    pub order_book_depth: u64,

    /// Sentiment score above which the worker signals BUY.
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: f64,

    /// Noise floor: adjacent-pair price changes below this are not scored.
    #[serde(default = "default_min_difference_for_analysis")]
    pub min_difference_for_analysis: f64,

    /// HOLD tolerance: a HOLD is a correct guess while the move stays inside
    /// this band. Wider than the noise floor.
    #[serde(default = "default_max_difference_for_hold")]
    pub max_difference_for_hold: f64,

    /// Observation retention in hours; the store enforces expiry.
    #[serde(default = "default_hours_to_keep_observations")]
    pub hours_to_keep_observations: u64,

    /// Seconds between trading cycles.
    #[serde(default = "default_trade_cycle_interval_secs")]
    pub trade_cycle_interval_secs: u64,

    /// Path of the shared observation store.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Root of the flat-file output tree (performance records, winners).
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Base URL of the exchange REST API.
    #[serde(default = "default_book_api_url")]
    pub book_api_url: String,

    /// Exchange API key. Redacted from every persisted artefact.
    #[serde(default)]
    pub api_key: String,

    /// Exchange API secret. Redacted from every persisted artefact.
    #[serde(default)]
    pub api_secret: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            market: default_market(),
            order_book_depth: default_order_book_depth(),
            sentiment_threshold: default_sentiment_threshold(),
            min_difference_for_analysis: default_min_difference_for_analysis(),
            max_difference_for_hold: default_max_difference_for_hold(),
            hours_to_keep_observations: default_hours_to_keep_observations(),
            trade_cycle_interval_secs: default_trade_cycle_interval_secs(),
            store_path: default_store_path(),
            log_dir: default_log_dir(),
            book_api_url: default_book_api_url(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

impl WorkerConfig {
    /// Load a worker configuration from the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read worker config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse worker config from {}", path.display()))?;

        info!(
            path = %path.display(),
            market = %config.market,
            cycle_secs = config.trade_cycle_interval_secs,
            "worker config loaded"
        );

        Ok(config)
    }

    /// The configuration as a JSON object map. serde_json maps iterate in
    /// sorted key order, which is what keeps the fingerprint order-stable.
    fn snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Order-stable identifier built from every numeric, non-secret entry.
    ///
    /// Two configurations with identical non-secret numeric values produce
    /// identical fingerprints regardless of which instance loaded them.
    pub fn fingerprint(&self) -> String {
        self.snapshot()
            .iter()
            .filter(|(key, value)| !is_credential_key(key) && value.is_number())
            .map(|(_, value)| value.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// The configuration with every credential-like entry removed, as
    /// persisted inside performance records.
    pub fn redacted(&self) -> serde_json::Map<String, serde_json::Value> {
        self.snapshot()
            .into_iter()
            .filter(|(key, _)| !is_credential_key(key))
            .collect()
    }
}

// =============================================================================
// Credential detection
// =============================================================================

static CREDENTIAL_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)key|secret|password|token").expect("credential pattern is valid"));

/// Whether a configuration key names a secret.
pub fn is_credential_key(key: &str) -> bool {
    CREDENTIAL_KEY.is_match(key)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.market, "BTC-EUR");
        assert!((cfg.min_difference_for_analysis - 0.005).abs() < f64::EPSILON);
        assert!((cfg.max_difference_for_hold - 0.01).abs() < f64::EPSILON);
        assert_eq!(cfg.hours_to_keep_observations, 24);
        assert_eq!(cfg.trade_cycle_interval_secs, 300);
        assert!(cfg.api_key.is_empty());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: WorkerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.market, "BTC-EUR");
        assert_eq!(cfg.log_dir, "log");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "market": "ETH-EUR", "sentiment_threshold": 60.0 }"#;
        let cfg: WorkerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.market, "ETH-EUR");
        assert!((cfg.sentiment_threshold - 60.0).abs() < f64::EPSILON);
        assert_eq!(cfg.hours_to_keep_observations, 24);
    }

    #[test]
    fn credential_keys_are_detected() {
        assert!(is_credential_key("api_key"));
        assert!(is_credential_key("api_secret"));
        assert!(is_credential_key("PASSWORD"));
        assert!(is_credential_key("session_token"));
        assert!(!is_credential_key("market"));
        assert!(!is_credential_key("sentiment_threshold"));
        assert!(!is_credential_key("hours_to_keep_observations"));
    }

    #[test]
    fn fingerprint_ignores_credentials_and_instance_identity() {
        let mut a = WorkerConfig::default();
        a.api_key = "alpha".to_string();
        a.api_secret = "one".to_string();

        let mut b = WorkerConfig::default();
        b.api_key = "beta".to_string();
        b.api_secret = "two".to_string();

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_numeric_values() {
        let a = WorkerConfig::default();
        let mut b = WorkerConfig::default();
        b.sentiment_threshold = 60.0;
        assert_ne!(a.fingerprint(), b.fingerprint());

        // Non-numeric entries do not contribute.
        let mut c = WorkerConfig::default();
        c.market = "ETH-EUR".to_string();
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn redacted_drops_secrets_keeps_the_rest() {
        let mut cfg = WorkerConfig::default();
        cfg.api_key = "should-not-leak".to_string();
        cfg.api_secret = "nor-this".to_string();

        let redacted = cfg.redacted();
        assert!(!redacted.contains_key("api_key"));
        assert!(!redacted.contains_key("api_secret"));
        assert_eq!(redacted["market"], serde_json::json!("BTC-EUR"));
        assert!(redacted.contains_key("sentiment_threshold"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkerConfig::load(dir.path().join("worker-nope.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read worker config"));
    }
}

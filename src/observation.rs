// =============================================================================
// Signal Observation Recorder
// =============================================================================
//
// One observation per trading cycle per worker, written to the shared store
// under `observation:{instanceId}:{timestampMillis}` with a store-enforced
// TTL. Key uniqueness relies on millisecond timestamps; cycle intervals are
// minutes, so a collision would require two cycles in the same millisecond.
// Accepted risk, no dedup.
// =============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{Fields, StoreError, TtlStore};
use crate::types::TradeSignal;

pub const OBSERVATION_KEY_PREFIX: &str = "observation";

/// One timestamped record of a worker's signal and the market it saw.
///
/// Immutable once written; owned exclusively by the worker named in
/// `instance_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub instance_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub mid_price: f64,
    pub trade_signal: TradeSignal,
    pub bid_volume: f64,
    pub number_of_bids: u64,
    pub ask_volume: f64,
    pub number_of_asks: u64,
    pub market_sentiment: f64,
}

impl Observation {
    /// Store key for this observation.
    pub fn key(&self) -> String {
        format!(
            "{OBSERVATION_KEY_PREFIX}:{}:{}",
            self.instance_id, self.timestamp
        )
    }

    /// Enumeration prefix covering every observation of one instance.
    pub fn key_prefix(instance_id: &str) -> String {
        format!("{OBSERVATION_KEY_PREFIX}:{instance_id}:")
    }

    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => unreachable!("observation serialises to an object"),
        }
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(fields.clone()))
    }
}

/// Persist one observation with the configured retention window.
pub async fn record_observation(
    store: &dyn TtlStore,
    observation: &Observation,
    retention_hours: u64,
) -> Result<(), StoreError> {
    let ttl = Duration::from_secs(retention_hours * 3600);
    let fields = observation.to_fields()?;
    store.put(&observation.key(), &fields, ttl).await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteTtlStore;

    pub(crate) fn sample_observation(instance_id: &str, timestamp: i64) -> Observation {
        Observation {
            instance_id: instance_id.to_string(),
            timestamp,
            mid_price: 100.0,
            trade_signal: TradeSignal::Buy,
            bid_volume: 3.0,
            number_of_bids: 12,
            ask_volume: 2.5,
            number_of_asks: 9,
            market_sentiment: 59.0,
        }
    }

    #[test]
    fn key_embeds_instance_and_timestamp() {
        let obs = sample_observation("abc", 1700000000123);
        assert_eq!(obs.key(), "observation:abc:1700000000123");
        assert!(obs.key().starts_with(&Observation::key_prefix("abc")));
    }

    #[test]
    fn field_map_roundtrip() {
        let obs = sample_observation("abc", 42);
        let fields = obs.to_fields().unwrap();
        assert_eq!(fields["tradeSignal"], serde_json::json!("BUY"));
        assert_eq!(fields["midPrice"], serde_json::json!(100.0));

        let back = Observation::from_fields(&fields).unwrap();
        assert_eq!(back, obs);
    }

    #[tokio::test]
    async fn record_writes_under_observation_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTtlStore::open(dir.path().join("store.db")).unwrap();
        let obs = sample_observation("abc", 1700000000123);

        record_observation(&store, &obs, 24).await.unwrap();

        let fields = store.get(&obs.key()).await.unwrap().unwrap();
        assert_eq!(Observation::from_fields(&fields).unwrap(), obs);
    }
}

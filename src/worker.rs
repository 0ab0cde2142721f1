// =============================================================================
// Worker - one isolated trading-cycle process
// =============================================================================
//
// A worker is bound to exactly one configuration file and one generated
// instance id for its whole life. Each cycle is strictly sequential:
//
//   fetch book -> derive signal -> persist observation -> evaluate
//     -> persist performance -> sleep until the next tick
//
// Failures inside a cycle are local: the tick is logged and the next one
// starts fresh. Only a failed observation write is logged at error severity,
// because that data point can never be recovered.
// =============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::book::{BookProvider, HttpBookProvider};
use crate::evaluator::{self, EvaluatorConfig};
use crate::observation::{record_observation, Observation};
use crate::performance::record_performance;
use crate::sentiment::{
    calculate_market_sentiment, calculate_trade_signal, calculate_visible_volume,
};
use crate::store::SqliteTtlStore;
use crate::worker_config::WorkerConfig;

/// Everything one worker needs, constructed once at startup. Replaces any
/// notion of process-wide state: two contexts never share anything mutable
/// except the store file itself.
pub struct WorkerContext {
    pub instance_id: String,
    pub config: WorkerConfig,
    /// Stem of the originating configuration file; part of the performance
    /// record path and of every log line this worker emits.
    pub config_file_stem: String,
    pub store: Arc<SqliteTtlStore>,
    pub book_provider: Box<dyn BookProvider>,
}

impl WorkerContext {
    /// Build the production wiring for `config` as loaded from `config_file`.
    pub fn new(config: WorkerConfig, config_file: &Path) -> Result<Self> {
        let instance_id = Uuid::new_v4().to_string();
        let config_file_stem = config_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let store = Arc::new(
            SqliteTtlStore::open(&config.store_path)
                .with_context(|| format!("failed to open store at {}", config.store_path))?,
        );
        let book_provider = Box::new(HttpBookProvider::new(
            &config.book_api_url,
            config.order_book_depth,
        ));

        Ok(Self {
            instance_id,
            config,
            config_file_stem,
            store,
            book_provider,
        })
    }

    fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            min_difference_for_analysis: self.config.min_difference_for_analysis,
            max_difference_for_hold: self.config.max_difference_for_hold,
        }
    }
}

/// Run one trading cycle.
pub async fn run_cycle(ctx: &WorkerContext) -> Result<()> {
    // Market snapshot and derived signal.
    let book = ctx.book_provider.fetch_book(&ctx.config.market).await?;
    let volume = calculate_visible_volume(&book)?;
    let sentiment = calculate_market_sentiment(&volume);
    let signal = calculate_trade_signal(&sentiment, ctx.config.sentiment_threshold);

    // Persist the observation. This write is the one non-recoverable step of
    // the cycle: the market state it captures is gone next tick.
    let observation = Observation {
        instance_id: ctx.instance_id.clone(),
        timestamp: Utc::now().timestamp_millis(),
        mid_price: volume.mid_price,
        trade_signal: signal,
        bid_volume: volume.bid_volume,
        number_of_bids: volume.number_of_bids,
        ask_volume: volume.ask_volume,
        number_of_asks: volume.number_of_asks,
        market_sentiment: sentiment.market_sentiment,
    };
    if let Err(e) = record_observation(
        ctx.store.as_ref(),
        &observation,
        ctx.config.hours_to_keep_observations,
    )
    .await
    {
        error!(
            instance_id = %ctx.instance_id,
            config_file = %ctx.config_file_stem,
            error = %e,
            "failed to persist observation"
        );
        return Err(e.into());
    }

    // Score the full history and log the cycle analysis.
    let evaluation =
        evaluator::evaluate(ctx.store.as_ref(), &ctx.instance_id, &ctx.evaluator_config()).await?;
    let average = evaluator::moving_average(ctx.store.as_ref(), &ctx.instance_id).await?;

    info!(
        instance_id = %ctx.instance_id,
        config_file = %ctx.config_file_stem,
        mid_price = volume.mid_price,
        signal = %signal,
        sentiment = sentiment.market_sentiment,
        guess_ratio = evaluation.guess_ratio,
        checks = evaluation.checks,
        moving_average = ?average,
        "cycle analysis"
    );

    record_performance(
        Path::new(&ctx.config.log_dir),
        &ctx.config_file_stem,
        &ctx.instance_id,
        &evaluation,
        &ctx.config,
    )?;

    Ok(())
}

/// Run trading cycles forever at the configured interval.
///
/// A failed cycle is logged and skipped; the store write of the next cycle is
/// the retry. Runs until the process exits.
pub async fn run_worker(ctx: WorkerContext) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(ctx.config.trade_cycle_interval_secs.max(1)));

    loop {
        interval.tick().await;
        if let Err(e) = run_cycle(&ctx).await {
            warn!(
                instance_id = %ctx.instance_id,
                config_file = %ctx.config_file_stem,
                error = %e,
                "trading cycle failed, retrying next tick"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::Book;
    use crate::performance::{record_path, PerformanceRecord};
    use crate::store::TtlStore;
    use async_trait::async_trait;

    struct StaticBookProvider {
        bids: Vec<(String, String)>,
        asks: Vec<(String, String)>,
    }

    #[async_trait]
    impl BookProvider for StaticBookProvider {
        async fn fetch_book(&self, market: &str) -> Result<Book> {
            Ok(Book {
                market: market.to_string(),
                nonce: 1,
                bids: self.bids.clone(),
                asks: self.asks.clone(),
            })
        }
    }

    struct FailingBookProvider;

    #[async_trait]
    impl BookProvider for FailingBookProvider {
        async fn fetch_book(&self, _market: &str) -> Result<Book> {
            anyhow::bail!("exchange unreachable")
        }
    }

    fn test_context(dir: &Path, provider: Box<dyn BookProvider>) -> WorkerContext {
        let mut config = WorkerConfig::default();
        config.store_path = dir.join("store.db").to_string_lossy().into_owned();
        config.log_dir = dir.join("log").to_string_lossy().into_owned();

        WorkerContext {
            instance_id: "test-instance".to_string(),
            config_file_stem: "worker-test".to_string(),
            store: Arc::new(SqliteTtlStore::open(dir.join("store.db")).unwrap()),
            book_provider: provider,
            config,
        }
    }

    #[tokio::test]
    async fn cycle_records_observation_and_performance() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Box::new(StaticBookProvider {
            bids: vec![("100".to_string(), "3".to_string())],
            asks: vec![("101".to_string(), "1".to_string())],
        });
        let ctx = test_context(dir.path(), provider);

        run_cycle(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        run_cycle(&ctx).await.unwrap();

        let keys = ctx
            .store
            .keys(&Observation::key_prefix(&ctx.instance_id))
            .await
            .unwrap();
        assert_eq!(keys.len(), 2);

        let path = record_path(
            Path::new(&ctx.config.log_dir),
            &ctx.config_file_stem,
            &ctx.instance_id,
        );
        let record: PerformanceRecord =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

        // Identical snapshots both cycles: the price never moved, so no pair
        // clears the noise floor.
        assert_eq!(record.checks, 0);
        assert_eq!(record.guess_ratio, 0.0);
        assert_eq!(record.fingerprint, ctx.config.fingerprint());
    }

    #[tokio::test]
    async fn failed_fetch_fails_the_cycle_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path(), Box::new(FailingBookProvider));

        assert!(run_cycle(&ctx).await.is_err());

        let keys = ctx
            .store
            .keys(&Observation::key_prefix(&ctx.instance_id))
            .await
            .unwrap();
        assert!(keys.is_empty());

        let path = record_path(
            Path::new(&ctx.config.log_dir),
            &ctx.config_file_stem,
            &ctx.instance_id,
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn heavy_bid_book_signals_buy() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Box::new(StaticBookProvider {
            bids: vec![("100".to_string(), "9".to_string())],
            asks: vec![("101".to_string(), "1".to_string())],
        });
        let ctx = test_context(dir.path(), provider);

        run_cycle(&ctx).await.unwrap();

        let keys = ctx
            .store
            .keys(&Observation::key_prefix(&ctx.instance_id))
            .await
            .unwrap();
        let fields = ctx.store.get(&keys[0]).await.unwrap().unwrap();
        let observation = Observation::from_fields(&fields).unwrap();
        assert_eq!(observation.trade_signal, crate::types::TradeSignal::Buy);
        assert!((observation.mid_price - 100.5).abs() < 1e-9);
    }
}

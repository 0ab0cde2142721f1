// =============================================================================
// Guess-Ratio Evaluator - scoring a worker's predictive accuracy
// =============================================================================
//
// Reads one instance's observation history back from the store and scores
// each chronologically adjacent pair: did the signal at `curr` predict the
// realized move to `next`?
//
// Store enumeration order is unspecified, so observations are always sorted
// by their embedded timestamp before scoring. Pairs whose relative price
// change sits below the noise floor are excluded from `checks` entirely; a
// HOLD is correct when the move stays inside the (wider) hold band.
// =============================================================================

use thiserror::Error;
use tracing::debug;

use crate::observation::Observation;
use crate::store::{StoreError, TtlStore};
use crate::types::TradeSignal;

/// Scoring thresholds, read once from the worker configuration.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// Relative price changes below this are noise and score nothing.
    pub min_difference_for_analysis: f64,
    /// A HOLD is correct while the move stays within this band.
    pub max_difference_for_hold: f64,
}

/// Evaluator output. `checks == 0` (fewer than two observations, or every
/// pair under the noise floor) yields `guess_ratio = 0.0`, a defined result.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Evaluation {
    pub guess_ratio: f64,
    pub checks: u64,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid observation: {0}")]
    InvalidObservation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch one instance's observations, chronologically sorted.
///
/// A key that expires between enumeration and fetch is a normal gap, not an
/// error. Malformed field maps fail the run.
pub async fn fetch_observations(
    store: &dyn TtlStore,
    instance_id: &str,
) -> Result<Vec<Observation>, EvalError> {
    let keys = store.keys(&Observation::key_prefix(instance_id)).await?;

    let mut observations = Vec::with_capacity(keys.len());
    for key in keys {
        match store.get(&key).await? {
            Some(fields) => {
                let observation = Observation::from_fields(&fields)
                    .map_err(|e| EvalError::InvalidObservation(format!("{key}: {e}")))?;
                observations.push(observation);
            }
            None => continue,
        }
    }

    observations.sort_by_key(|o| o.timestamp);
    Ok(observations)
}

/// Evaluate one instance's guess ratio from its stored history.
pub async fn evaluate(
    store: &dyn TtlStore,
    instance_id: &str,
    config: &EvaluatorConfig,
) -> Result<Evaluation, EvalError> {
    let observations = fetch_observations(store, instance_id).await?;
    score(&observations, config)
}

/// Score a chronologically sorted observation sequence.
pub fn score(
    observations: &[Observation],
    config: &EvaluatorConfig,
) -> Result<Evaluation, EvalError> {
    let mut correct: u64 = 0;
    let mut checks: u64 = 0;

    for pair in observations.windows(2) {
        let (curr, next) = (&pair[0], &pair[1]);

        if curr.mid_price == 0.0 {
            return Err(EvalError::InvalidObservation(format!(
                "mid price is zero at timestamp {}",
                curr.timestamp
            )));
        }

        let price_change = (next.mid_price - curr.mid_price) / curr.mid_price;
        let difference = price_change.abs();

        if difference < config.min_difference_for_analysis {
            debug!(
                difference,
                floor = config.min_difference_for_analysis,
                "price change below analysis floor, skipping pair"
            );
            continue;
        }

        checks += 1;
        let correct_guess = match curr.trade_signal {
            TradeSignal::Buy => price_change > 0.0,
            TradeSignal::Sell => price_change < 0.0,
            TradeSignal::Hold => difference <= config.max_difference_for_hold,
        };
        if correct_guess {
            correct += 1;
        }
    }

    let guess_ratio = if checks > 0 {
        correct as f64 / checks as f64
    } else {
        0.0
    };

    Ok(Evaluation { guess_ratio, checks })
}

/// Mean mid price over the retained observation window, `None` without data.
pub async fn moving_average(
    store: &dyn TtlStore,
    instance_id: &str,
) -> Result<Option<f64>, EvalError> {
    let observations = fetch_observations(store, instance_id).await?;
    if observations.is_empty() {
        return Ok(None);
    }
    let sum: f64 = observations.iter().map(|o| o.mid_price).sum();
    Ok(Some(sum / observations.len() as f64))
}

/// Standard deviation of the retained mid prices, `None` without data.
pub async fn volatility(
    store: &dyn TtlStore,
    instance_id: &str,
) -> Result<Option<f64>, EvalError> {
    let observations = fetch_observations(store, instance_id).await?;
    if observations.is_empty() {
        return Ok(None);
    }
    let mid_prices: Vec<f64> = observations.iter().map(|o| o.mid_price).collect();
    let mean = mid_prices.iter().sum::<f64>() / mid_prices.len() as f64;
    let variance =
        mid_prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / mid_prices.len() as f64;
    Ok(Some(variance.sqrt()))
}

// =============================================================================
// Tests
// =============================================================================

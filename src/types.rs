// =============================================================================
// Shared types used across the Vela evaluation engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Directional prediction a worker emits once per trading cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Buy,
    Sell,
    Hold,
}

impl Default for TradeSignal {
    fn default() -> Self {
        Self::Hold
    }
}

impl std::fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Market sentiment derived from visible order book volume.
///
/// `market_sentiment` is a 0..=100 score; 50 is neutral, above 50 leans
/// bullish.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    pub bid_volume_percentage: f64,
    pub market_sentiment: f64,
}

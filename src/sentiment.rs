// =============================================================================
// Sentiment Pipeline - visible volume, market sentiment, trade signal
// =============================================================================
//
// Pure arithmetic over an order book snapshot:
//
//   Book -> VisibleVolume -> SentimentResult -> TradeSignal
//
// The signal derivation is intentionally simple (sentiment above a threshold
// buys, anything else sells); the evaluation subsystem scores whatever signal
// source is wired in, HOLD included.
// =============================================================================

use anyhow::{Context, Result};
use serde::Serialize;

use crate::book::Book;
use crate::types::{SentimentResult, TradeSignal};

/// A parsed order book level.
#[derive(Debug, Clone, Copy)]
struct ProcessedOrder {
    price: f64,
    volume: f64,
}

/// Aggregate view of the volume visible in one order book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleVolume {
    pub bid_volume: f64,
    pub number_of_bids: u64,
    pub ask_volume: f64,
    pub number_of_asks: u64,
    pub mid_price: f64,
    pub weighted_average_price: f64,
    pub bid_ask_spread: f64,
    pub order_book_imbalance: f64,
}

fn process_orders(orders: &[(String, String)]) -> Vec<ProcessedOrder> {
    orders
        .iter()
        .filter_map(|(price, volume)| {
            let price = price.parse::<f64>().ok()?;
            let volume = volume.parse::<f64>().ok()?;
            Some(ProcessedOrder { price, volume })
        })
        .collect()
}

fn cumulative_volume(orders: &[ProcessedOrder]) -> f64 {
    orders.iter().map(|o| o.volume).sum()
}

fn weighted_average_price(orders: &[ProcessedOrder]) -> f64 {
    let total_volume = cumulative_volume(orders);
    if total_volume <= 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = orders.iter().map(|o| o.price * o.volume).sum();
    weighted_sum / total_volume
}

/// Aggregate the visible volume for one order book snapshot.
///
/// Fails when either side of the book has no parseable levels; a one-sided
/// book has no mid price to observe.
pub fn calculate_visible_volume(book: &Book) -> Result<VisibleVolume> {
    let mut bids = process_orders(&book.bids);
    let mut asks = process_orders(&book.asks);

    // Bids descending, asks ascending, so the best level is first.
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
    asks.sort_by(|a, b| a.price.total_cmp(&b.price));

    let best_bid = bids
        .first()
        .with_context(|| format!("order book for {} has no bids", book.market))?;
    let best_ask = asks
        .first()
        .with_context(|| format!("order book for {} has no asks", book.market))?;

    let mid_price = (best_bid.price + best_ask.price) / 2.0;
    let bid_volume = cumulative_volume(&bids);
    let ask_volume = cumulative_volume(&asks);

    let weighted_average_price =
        (weighted_average_price(&bids) + weighted_average_price(&asks)) / 2.0;
    let bid_ask_spread = best_ask.price - best_bid.price;

    let total_volume = bid_volume + ask_volume;
    let order_book_imbalance = if total_volume > 0.0 {
        (bid_volume - ask_volume) / total_volume
    } else {
        0.0
    };

    Ok(VisibleVolume {
        bid_volume,
        number_of_bids: bids.len() as u64,
        ask_volume,
        number_of_asks: asks.len() as u64,
        mid_price,
        weighted_average_price,
        bid_ask_spread,
        order_book_imbalance,
    })
}

/// Map visible volume to a 0..=100 sentiment score.
pub fn calculate_market_sentiment(volume: &VisibleVolume) -> SentimentResult {
    let total_volume = volume.bid_volume + volume.ask_volume;
    let bid_volume_percentage = if total_volume > 0.0 {
        (volume.bid_volume / total_volume) * 100.0
    } else {
        50.0
    };

    let raw_sentiment = (bid_volume_percentage - 50.0) * 2.0;
    let market_sentiment = (50.0 + raw_sentiment).clamp(0.0, 100.0);

    SentimentResult {
        bid_volume_percentage,
        market_sentiment,
    }
}

/// Derive the trade signal from the sentiment score.
pub fn calculate_trade_signal(sentiment: &SentimentResult, threshold: f64) -> TradeSignal {
    if sentiment.market_sentiment > threshold {
        TradeSignal::Buy
    } else {
        TradeSignal::Sell
    }
}

// =============================================================================
// Tests
// =============================================================================

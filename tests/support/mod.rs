//! Shared fixtures for integration tests.

#![allow(dead_code)]

use craftcost::item_id::ItemId;
use craftcost::market::MarketSnapshot;
use craftcost::models::{MarketQuote, ProductMetrics};

pub const EPS: f64 = 1e-9;

/// Assert two floats agree within `EPS`, relative for large values.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = EPS * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

pub fn id(raw: &str) -> ItemId {
    ItemId::new(raw)
}

pub fn quote(sell: f64, insta: f64, weekly_volume: f64) -> MarketQuote {
    MarketQuote { sell_order_price: sell, insta_buy_price: insta, moving_week_buy_volume: weekly_volume }
}

pub fn metrics(listing_size: f64, listing_frequency: f64, order_size: f64, order_frequency: f64) -> ProductMetrics {
    ProductMetrics { listing_size, listing_frequency, order_size, order_frequency }
}

/// Supply 2/cycle against demand 4/cycle: one refill fills 0.5 units.
pub fn draining() -> ProductMetrics {
    metrics(2.0, 1.0, 1.0, 4.0)
}

/// Builds a snapshot one listing at a time.
#[derive(Default)]
pub struct Market {
    snapshot: MarketSnapshot,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listing with the given prices and all-zero metrics.
    pub fn listed(mut self, item: &str, sell: f64, insta: f64) -> Self {
        self.snapshot.insert_quote(id(item), quote(sell, insta, 0.0));
        self.snapshot.insert_metrics(id(item), ProductMetrics::default());
        self
    }

    pub fn quote(mut self, item: &str, q: MarketQuote) -> Self {
        self.snapshot.insert_quote(id(item), q);
        self
    }

    pub fn metrics(mut self, item: &str, m: ProductMetrics) -> Self {
        self.snapshot.insert_metrics(id(item), m);
        self
    }

    pub fn build(self) -> MarketSnapshot {
        self.snapshot
    }
}

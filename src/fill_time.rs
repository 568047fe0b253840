//! Fill-time model
//!
//! How long the market takes to absorb an insta-sell of N units, and how long
//! a standing buy order for N units takes to fill. Both are in seconds and
//! both treat a quantity <= 0 as taking no time.

use crate::cost::{instant_fill_qty, refill_rounds};
use crate::item_id::ItemId;
use crate::market::MarketSnapshot;
use crate::models::{AcquisitionDetail, Method, ProductMetrics};

pub const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Seconds per order cycle in the buy-order model.
pub const ORDER_CYCLE_SECONDS: f64 = 20.0;

fn normalize_time(secs: f64) -> f64 {
    if secs.is_nan() || secs < 0.0 { f64::INFINITY } else { secs }
}

/// Time to insta-sell `quantity` units given the weekly buy volume.
pub fn instasell_fill_time(quantity: f64, moving_week_buy_volume: f64) -> f64 {
    if quantity <= 0.0 {
        return 0.0;
    }
    if moving_week_buy_volume.is_nan() || moving_week_buy_volume <= 0.0 {
        return f64::INFINITY;
    }
    normalize_time(quantity / (moving_week_buy_volume / SECONDS_PER_WEEK))
}

/// Time for a standing buy order of `quantity` units to fill.
pub fn buy_order_fill_time(quantity: f64, metrics: &ProductMetrics) -> f64 {
    if quantity <= 0.0 {
        return 0.0;
    }
    let net = metrics.net_flow();
    if net > 0.0 {
        return normalize_time(ORDER_CYCLE_SECONDS * quantity / net);
    }

    let order_frequency = metrics.clamped().order_frequency;
    let rounds = refill_rounds(quantity, instant_fill_qty(metrics));
    if order_frequency <= 0.0 || !rounds.is_finite() {
        return f64::INFINITY;
    }
    normalize_time(ORDER_CYCLE_SECONDS * rounds * quantity / order_frequency)
}

/// Insta-sell time for the finished good, infinite when it is not listed.
pub fn top_level_instasell_time(snapshot: &MarketSnapshot, item: &ItemId, quantity: f64) -> f64 {
    match snapshot.listing(item) {
        Some(listing) => instasell_fill_time(quantity, listing.moving_week_buy_volume),
        None if quantity <= 0.0 => 0.0,
        None => f64::INFINITY,
    }
}

/// How long acquiring a resolved base component takes. Buy orders wait for
/// the book, insta-buys are immediate.
pub fn acquisition_fill_time(snapshot: &MarketSnapshot, item: &ItemId, detail: &AcquisitionDetail) -> f64 {
    match detail.method {
        Method::InstaBuy => 0.0,
        Method::BuyOrder => match snapshot.metrics(item) {
            Some(metrics) => buy_order_fill_time(detail.quantity, metrics),
            None if detail.quantity <= 0.0 => 0.0,
            None => f64::INFINITY,
        },
        Method::Unavailable => f64::INFINITY,
    }
}

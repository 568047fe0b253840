//! Acquisition cost model
//!
//! The best buy-order price only covers the first unit. When demand keeps
//! pace with supply, a large standing order drains the listings faster than
//! they refill, so later units cost more. The model estimates how much one
//! refill cycle can fill (`instant_fill_qty`), how many cycles the order needs
//! (`refill_rounds`) and charges an adjustment for the extra cycles.
//! Insta-buying is linear in quantity.

use tracing::debug;

use crate::error::{Error, Result};
use crate::item_id::ItemId;
use crate::market::MarketSnapshot;
use crate::models::{AcquisitionDetail, FillParams, MarketQuote, Method, ProductMetrics, is_valid_cost, is_valid_price};

/// Both direct costs for N units of one good plus the buy-order diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub buy_order: f64,
    pub insta_buy: f64,
    pub instant_fill_qty: f64,
    pub refill_rounds: f64,
    pub supply_demand_ratio: f64,
    pub adjustment_factor: f64,
    /// No metrics for the good; the buy-order branch could not be modelled.
    pub metrics_missing: bool,
}

impl CostBreakdown {
    fn zero() -> Self {
        Self {
            buy_order: 0.0,
            insta_buy: 0.0,
            instant_fill_qty: 0.0,
            refill_rounds: 0.0,
            supply_demand_ratio: 1.0,
            adjustment_factor: 0.0,
            metrics_missing: false,
        }
    }

    /// Buy order wins ties; an invalid cost never wins.
    pub fn best_method(&self) -> Method {
        match (is_valid_cost(self.buy_order), is_valid_cost(self.insta_buy)) {
            (true, true) if self.buy_order <= self.insta_buy => Method::BuyOrder,
            (true, false) => Method::BuyOrder,
            (_, true) => Method::InstaBuy,
            (false, false) => Method::Unavailable,
        }
    }

    pub fn cost_of(&self, method: Method) -> f64 {
        match method {
            Method::BuyOrder => self.buy_order,
            Method::InstaBuy => self.insta_buy,
            Method::Unavailable => f64::INFINITY,
        }
    }
}

/// Fill one refill cycle can absorb: `listing_size * listing_frequency / order_frequency`,
/// or 0 when no orders are placed.
pub fn instant_fill_qty(metrics: &ProductMetrics) -> f64 {
    let m = metrics.clamped();
    if m.order_frequency <= 0.0 {
        return 0.0;
    }
    (m.listing_size * (m.listing_frequency / m.order_frequency)).max(0.0)
}

/// `ceil(quantity / instant_fill_qty)`, at least 1. A cycle that fills
/// nothing counts as a single round.
pub fn refill_rounds(quantity: f64, instant_fill_qty: f64) -> f64 {
    if instant_fill_qty <= 0.0 {
        return 1.0;
    }
    (quantity / instant_fill_qty).ceil().max(1.0)
}

/// NaN, negative and -inf all mean "not obtainable this way".
pub fn normalize_cost(cost: f64) -> f64 {
    if cost.is_nan() || cost < 0.0 { f64::INFINITY } else { cost }
}

/// Cost of `quantity` units via a buy order and via insta-buy.
///
/// A quantity <= 0 costs nothing. A NaN quantity or a non-positive or
/// non-finite price is rejected.
pub fn acquisition_cost(
    item: &ItemId,
    quantity: f64,
    quote: &MarketQuote,
    metrics: &ProductMetrics,
) -> Result<CostBreakdown> {
    if quantity.is_nan() {
        return Err(Error::InvalidQuantity { item: item.to_string(), quantity });
    }
    if quantity <= 0.0 {
        return Ok(CostBreakdown::zero());
    }
    let sell_price = quote.sell_order_price;
    let insta_price = quote.insta_buy_price;
    if !is_valid_price(sell_price) || !is_valid_price(insta_price) {
        return Err(Error::InvalidPrice {
            item: item.to_string(),
            sell_order_price: sell_price,
            insta_buy_price: insta_price,
        });
    }

    let supply = metrics.supply_rate();
    let demand = metrics.demand_rate();
    let ratio = if demand > 0.0 {
        supply / demand
    } else if supply > 0.0 {
        f64::INFINITY
    } else {
        1.0
    };
    let base = quantity * sell_price;

    let (buy_order, fill_qty, rounds, adjustment) = if ratio > 1.0 {
        (base, f64::INFINITY, 1.0, 0.0)
    } else {
        let fill_qty = instant_fill_qty(metrics);
        let rounds = refill_rounds(quantity, fill_qty);
        if !rounds.is_finite() {
            (f64::INFINITY, fill_qty, rounds, 0.0)
        } else {
            let adjustment = if rounds > 1.0 { 1.0 - 1.0 / rounds } else { 0.0 };
            let extra = if adjustment > 0.0 {
                let k = rounds.floor();
                let sum_k = k * (k + 1.0) / 2.0;
                (sell_price * (quantity * rounds - fill_qty * sum_k)).max(0.0)
            } else {
                0.0
            };
            (base + adjustment * extra, fill_qty, rounds, adjustment)
        }
    };

    let breakdown = CostBreakdown {
        buy_order: normalize_cost(buy_order),
        insta_buy: normalize_cost(quantity * insta_price),
        instant_fill_qty: fill_qty,
        refill_rounds: rounds,
        supply_demand_ratio: ratio,
        adjustment_factor: adjustment,
        metrics_missing: false,
    };
    debug!(
        item = %item,
        quantity,
        supply,
        demand,
        ratio,
        instant_fill_qty = fill_qty,
        refill_rounds = rounds,
        adjustment,
        buy_order = breakdown.buy_order,
        insta_buy = breakdown.insta_buy,
        "cost model"
    );
    Ok(breakdown)
}

/// Direct costs for a good in `snapshot`, or `None` when it has no usable quote.
/// Missing metrics leave insta-buy available and make the buy order infinite.
pub fn direct_costs(snapshot: &MarketSnapshot, item: &ItemId, quantity: f64) -> Result<Option<CostBreakdown>> {
    let Some(quote) = snapshot.quote(item) else {
        return Ok(None);
    };
    match snapshot.metrics(item) {
        Some(metrics) => acquisition_cost(item, quantity, quote, metrics).map(Some),
        None => {
            if quantity.is_nan() {
                return Err(Error::InvalidQuantity { item: item.to_string(), quantity });
            }
            if quantity <= 0.0 {
                return Ok(Some(CostBreakdown::zero()));
            }
            Ok(Some(CostBreakdown {
                buy_order: f64::INFINITY,
                insta_buy: normalize_cost(quantity * quote.insta_buy_price),
                instant_fill_qty: f64::NAN,
                refill_rounds: f64::NAN,
                supply_demand_ratio: f64::NAN,
                adjustment_factor: 0.0,
                metrics_missing: true,
            }))
        }
    }
}

/// Resolve a good as a base component: pick the cheaper direct method.
pub fn evaluate(snapshot: &MarketSnapshot, item: &ItemId, quantity: f64) -> Result<AcquisitionDetail> {
    if quantity.is_nan() {
        return Err(Error::InvalidQuantity { item: item.to_string(), quantity });
    }
    if quantity <= 0.0 {
        return Ok(AcquisitionDetail {
            quantity,
            method: Method::BuyOrder,
            best_cost: 0.0,
            fill: None,
            note: None,
        });
    }

    let Some(breakdown) = direct_costs(snapshot, item, quantity)? else {
        return Ok(AcquisitionDetail {
            quantity,
            method: Method::Unavailable,
            best_cost: f64::INFINITY,
            fill: None,
            note: Some("not listed on market".to_string()),
        });
    };

    let method = breakdown.best_method();
    let fill = match (method, snapshot.metrics(item)) {
        (Method::BuyOrder, Some(metrics)) => Some(FillParams {
            instant_fill_qty: breakdown.instant_fill_qty,
            refill_rounds: breakdown.refill_rounds,
            supply_minus_demand: metrics.net_flow(),
        }),
        _ => None,
    };
    let mut detail = AcquisitionDetail {
        quantity,
        method,
        best_cost: breakdown.cost_of(method),
        fill,
        note: None,
    };
    if breakdown.metrics_missing {
        detail.push_note("metrics missing");
    }
    if method == Method::Unavailable {
        detail.push_note("no valid acquisition cost");
    }
    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(sell: f64, insta: f64) -> MarketQuote {
        MarketQuote { sell_order_price: sell, insta_buy_price: insta, moving_week_buy_volume: 0.0 }
    }

    fn id(s: &str) -> ItemId {
        ItemId::new(s)
    }

    #[test]
    fn zero_metrics_fall_back_to_base_cost() {
        let b = acquisition_cost(&id("A"), 7.0, &quote(10.0, 12.0), &ProductMetrics::default()).unwrap();
        assert_eq!(b.supply_demand_ratio, 1.0);
        assert_eq!(b.instant_fill_qty, 0.0);
        assert_eq!(b.refill_rounds, 1.0);
        assert_eq!(b.adjustment_factor, 0.0);
        assert_eq!(b.buy_order, 70.0);
        assert_eq!(b.insta_buy, 84.0);
        assert_eq!(b.best_method(), Method::BuyOrder);
    }

    #[test]
    fn supply_without_demand_is_single_pass() {
        let m = ProductMetrics { listing_size: 10.0, listing_frequency: 5.0, order_size: 0.0, order_frequency: 0.0 };
        let b = acquisition_cost(&id("B"), 100.0, &quote(3.0, 4.0), &m).unwrap();
        assert_eq!(b.supply_demand_ratio, f64::INFINITY);
        assert_eq!(b.instant_fill_qty, f64::INFINITY);
        assert_eq!(b.refill_rounds, 1.0);
        assert_eq!(b.buy_order, 300.0);
    }

    #[test]
    fn depleted_book_charges_refill_adjustment() {
        // supply 2*1 = 2, demand 1*4 = 4 -> ratio 0.5
        // IF = 2 * (1/4) = 0.5, RR = ceil(3/0.5) = 6, adj = 5/6
        // k = 6, sumK = 21, extra = 10 * (3*6 - 0.5*21) = 75
        let m = ProductMetrics { listing_size: 2.0, listing_frequency: 1.0, order_size: 1.0, order_frequency: 4.0 };
        let b = acquisition_cost(&id("C"), 3.0, &quote(10.0, 100.0), &m).unwrap();
        assert_eq!(b.refill_rounds, 6.0);
        assert!((b.adjustment_factor - 5.0 / 6.0).abs() < 1e-12);
        assert!((b.buy_order - (30.0 + 75.0 * 5.0 / 6.0)).abs() < 1e-9);
        assert_eq!(b.insta_buy, 300.0);
    }

    #[test]
    fn zero_quantity_is_free() {
        let b = acquisition_cost(&id("A"), 0.0, &quote(10.0, 12.0), &ProductMetrics::default()).unwrap();
        assert_eq!(b.buy_order, 0.0);
        assert_eq!(b.insta_buy, 0.0);
        let b = acquisition_cost(&id("A"), -3.0, &quote(10.0, 12.0), &ProductMetrics::default()).unwrap();
        assert_eq!(b.buy_order, 0.0);
    }

    #[test]
    fn rejects_nan_quantity_and_bad_prices() {
        let m = ProductMetrics::default();
        assert!(matches!(
            acquisition_cost(&id("A"), f64::NAN, &quote(1.0, 1.0), &m),
            Err(Error::InvalidQuantity { .. })
        ));
        assert!(matches!(
            acquisition_cost(&id("A"), 1.0, &quote(0.0, 1.0), &m),
            Err(Error::InvalidPrice { .. })
        ));
        assert!(matches!(
            acquisition_cost(&id("A"), 1.0, &quote(1.0, f64::NAN), &m),
            Err(Error::InvalidPrice { .. })
        ));
    }

    #[test]
    fn insta_buy_wins_when_cheaper() {
        let m = ProductMetrics { listing_size: 2.0, listing_frequency: 1.0, order_size: 1.0, order_frequency: 4.0 };
        let b = acquisition_cost(&id("C"), 3.0, &quote(10.0, 11.0), &m).unwrap();
        assert_eq!(b.best_method(), Method::InstaBuy);
    }

    #[test]
    fn missing_metrics_leave_insta_buy() {
        let mut snap = MarketSnapshot::new();
        snap.insert_quote(id("A"), quote(10.0, 12.0));
        let detail = evaluate(&snap, &id("A"), 2.0).unwrap();
        assert_eq!(detail.method, Method::InstaBuy);
        assert_eq!(detail.best_cost, 24.0);
        assert_eq!(detail.note.as_deref(), Some("metrics missing"));
    }

    #[test]
    fn unlisted_good_is_unavailable() {
        let snap = MarketSnapshot::new();
        let detail = evaluate(&snap, &id("A"), 2.0).unwrap();
        assert_eq!(detail.method, Method::Unavailable);
        assert_eq!(detail.best_cost, f64::INFINITY);
        assert!(!detail.is_valid());
    }

    #[test]
    fn buy_order_detail_carries_fill_params() {
        let mut snap = MarketSnapshot::new();
        snap.insert_quote(id("A"), quote(10.0, 12.0));
        snap.insert_metrics(id("A"), ProductMetrics::default());
        let detail = evaluate(&snap, &id("A"), 5.0).unwrap();
        assert_eq!(detail.method, Method::BuyOrder);
        assert_eq!(detail.best_cost, 50.0);
        let fill = detail.fill.unwrap();
        assert_eq!(fill.refill_rounds, 1.0);
        assert_eq!(fill.supply_minus_demand, 0.0);
    }

    #[test]
    fn normalizes_bad_costs() {
        assert_eq!(normalize_cost(f64::NAN), f64::INFINITY);
        assert_eq!(normalize_cost(-1.0), f64::INFINITY);
        assert_eq!(normalize_cost(f64::NEG_INFINITY), f64::INFINITY);
        assert_eq!(normalize_cost(4.0), 4.0);
    }
}

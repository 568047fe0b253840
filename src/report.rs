//! Single-perspective fill report: what to order for one target quantity,
//! how long the slowest order takes to fill, and the resulting profit.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::calculator::{Engine, aggregate_base_ingredients};
use crate::error::Result;
use crate::fill_time;
use crate::item_id::ItemId;
use crate::models::{Method, format_cost, format_duration, is_valid_cost};
use crate::perspective::validate_quantity;
use crate::wire::{self, WireF64};

#[derive(Debug, Clone, Serialize)]
pub struct FillRow {
    pub name: ItemId,
    #[serde(with = "wire::float")]
    pub qty: f64,
    #[serde(with = "wire::float")]
    pub cost_per_unit: f64,
    #[serde(with = "wire::float")]
    pub total_cost: f64,
    pub price_source: &'static str,
    #[serde(with = "wire::float")]
    pub buy_order_fill_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rr: Option<WireF64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    pub item: ItemId,
    #[serde(with = "wire::float")]
    pub quantity: f64,
    pub recipe: Vec<FillRow>,
    pub slowest_ingredient: Option<ItemId>,
    #[serde(with = "wire::float")]
    pub slowest_ingredient_qty: f64,
    #[serde(with = "wire::float")]
    pub slowest_fill_time: f64,
    #[serde(with = "wire::float")]
    pub top_level_instasell_time: f64,
    #[serde(with = "wire::float")]
    pub total_base_cost: f64,
    #[serde(with = "wire::float")]
    pub top_sell_price: f64,
    #[serde(with = "wire::float")]
    pub total_revenue: f64,
    #[serde(with = "wire::float")]
    pub profit_per_unit: f64,
    #[serde(with = "wire::float")]
    pub total_profit: f64,
    pub warnings: Vec<String>,
    pub degraded: bool,
}

fn price_source(method: Method) -> &'static str {
    match method {
        Method::BuyOrder => "buy_order",
        Method::InstaBuy => "insta_buy",
        Method::Unavailable => "unavailable",
    }
}

/// Build the fill report for `quantity` units of `item`.
///
/// The target is always crafted when it has a usable recipe, even if buying
/// it outright would be cheaper. Fill times assume every ingredient is
/// bought with a standing order, so the slowest row is the one whose buy
/// order takes longest to fill.
pub fn fill_report(engine: &Engine<'_>, item: &ItemId, quantity: f64) -> Result<FillReport> {
    validate_quantity(item, quantity)?;
    let snapshot = engine.snapshot();

    let tree = engine.craft_tree(item, quantity)?;
    let bases = aggregate_base_ingredients(snapshot, &tree)?;

    let mut warnings = Vec::new();
    tree.collect_notes(&mut warnings);

    let mut recipe = Vec::with_capacity(bases.len());
    let mut total_base_cost = 0.0;
    for (name, detail) in bases {
        let buy_order_fill_time = match snapshot.metrics(&name) {
            Some(metrics) => fill_time::buy_order_fill_time(detail.quantity, metrics),
            None => f64::INFINITY,
        };
        if is_valid_cost(detail.best_cost) {
            total_base_cost += detail.best_cost;
        } else {
            total_base_cost = f64::INFINITY;
        }
        recipe.push(FillRow {
            cost_per_unit: detail.unit_cost(),
            total_cost: detail.best_cost,
            price_source: price_source(detail.method),
            buy_order_fill_time,
            rr: detail.refill_rounds().filter(|rr| rr.is_finite()).map(WireF64),
            qty: detail.quantity,
            name,
        });
    }

    let mut slowest: Option<&FillRow> = None;
    for row in &recipe {
        if slowest.is_none_or(|s| row.buy_order_fill_time > s.buy_order_fill_time) {
            slowest = Some(row);
        }
    }
    let (slowest_ingredient, slowest_ingredient_qty, slowest_fill_time) =
        slowest.map_or((None, 0.0, 0.0), |s| (Some(s.name.clone()), s.qty, s.buy_order_fill_time));

    let top_sell_price = match snapshot.quote(item) {
        Some(quote) => quote.insta_buy_price,
        None => {
            warnings.push(format!("{}: not listed on market, revenue unknown", item));
            f64::NAN
        }
    };
    let total_revenue = top_sell_price * quantity;
    let profit_per_unit = top_sell_price - total_base_cost / quantity;
    let total_profit = total_revenue - total_base_cost;
    let degraded = !warnings.is_empty();

    info!(item = %item, quantity, rows = recipe.len(), total_base_cost, total_profit, "fill report built");

    Ok(FillReport {
        item: item.clone(),
        quantity,
        recipe,
        slowest_ingredient,
        slowest_ingredient_qty,
        slowest_fill_time,
        top_level_instasell_time: fill_time::top_level_instasell_time(snapshot, item, quantity),
        total_base_cost,
        top_sell_price,
        total_revenue,
        profit_per_unit,
        total_profit,
        warnings,
        degraded,
    })
}

impl fmt::Display for FillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Fill: {:.0}x {} ===", self.quantity, self.item)?;
        writeln!(
            f,
            "  {:<32} {:>10} {:>12} {:>14} {:<12} {:>10}",
            "ingredient", "qty", "unit", "total", "source", "fill"
        )?;
        for row in &self.recipe {
            writeln!(
                f,
                "  {:<32} {:>10.0} {:>12} {:>14} {:<12} {:>10}",
                row.name.as_str(),
                row.qty,
                format_cost(row.cost_per_unit),
                format_cost(row.total_cost),
                row.price_source,
                format_duration(row.buy_order_fill_time)
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Total base cost: {}", format_cost(self.total_base_cost))?;
        writeln!(
            f,
            "Revenue:         {} ({} each)",
            format_cost(self.total_revenue),
            format_cost(self.top_sell_price)
        )?;
        writeln!(
            f,
            "Profit:          {} ({} each)",
            format_cost(self.total_profit),
            format_cost(self.profit_per_unit)
        )?;
        if let Some(name) = &self.slowest_ingredient {
            writeln!(
                f,
                "Slowest fill:    {} x{:.0} ({})",
                name,
                self.slowest_ingredient_qty,
                format_duration(self.slowest_fill_time)
            )?;
        }
        writeln!(f, "Insta-sell time: {}", format_duration(self.top_level_instasell_time))?;
        for warning in &self.warnings {
            writeln!(f, "Warning: {}", warning)?;
        }
        Ok(())
    }
}

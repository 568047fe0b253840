//! Quantity optimizer
//!
//! Finds the largest quantity of a good whose acquisition plus resale fits a
//! time budget, then ranks goods by the profit at that quantity.
//!
//! Feasibility is assumed to be monotonic in quantity. It is not guaranteed:
//! a larger order can flip a node from buying to crafting and change the
//! slowest ingredient. The search then returns a feasible quantity that may
//! not be the largest one.

use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::calculator::Engine;
use crate::error::Result;
use crate::item_id::ItemId;
use crate::perspective::{DualResolution, resolve_dual};
use crate::wire;

/// Hard ceiling on binary-search probes.
pub const MAX_ITERATIONS: u32 = 50;

const FALLBACK_MAX_SEARCH_QTY: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    pub time_budget_secs: f64,
    pub max_search_qty: f64,
    pub max_iterations: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            time_budget_secs: 3600.0,
            max_search_qty: FALLBACK_MAX_SEARCH_QTY,
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl OptimizerSettings {
    fn search_bound(&self) -> u64 {
        let bound = if self.max_search_qty.is_nan() || self.max_search_qty <= 0.0 {
            FALLBACK_MAX_SEARCH_QTY
        } else {
            self.max_search_qty
        };
        (bound.floor() as u64).max(1)
    }

    fn iterations(&self) -> u32 {
        self.max_iterations.clamp(1, MAX_ITERATIONS)
    }
}

/// One evaluation of the feasibility predicate.
#[derive(Debug, Clone)]
pub struct Probe {
    pub quantity: u64,
    pub resolution: DualResolution,
    pub acquisition_time: f64,
    pub sale_time: f64,
}

impl Probe {
    pub fn run(engine: &Engine<'_>, item: &ItemId, quantity: u64) -> Result<Self> {
        let resolution = resolve_dual(engine, item, quantity as f64)?;
        let acquisition_time = nan_as_infinite(resolution.primary_based.slowest_ingredient_buy_time_seconds);
        let sale_time = nan_as_infinite(resolution.top_level_instasell_time_seconds);
        Ok(Self { quantity, resolution, acquisition_time, sale_time })
    }

    pub fn total_time(&self) -> f64 {
        self.acquisition_time + self.sale_time
    }

    pub fn is_feasible(&self, time_budget_secs: f64) -> bool {
        self.resolution.primary_based.calculation_possible && self.total_time() <= time_budget_secs
    }
}

fn nan_as_infinite(secs: f64) -> f64 {
    if secs.is_nan() { f64::INFINITY } else { secs }
}

/// Largest feasible quantity in `[1, max_search_qty]`, or 0 when even one
/// unit does not fit the budget. Returns the probe at that quantity.
pub fn find_max_quantity(engine: &Engine<'_>, item: &ItemId, settings: &OptimizerSettings) -> Result<Probe> {
    let budget = settings.time_budget_secs;
    let first = Probe::run(engine, item, 1)?;
    if !first.is_feasible(budget) {
        debug!(item = %item, total_time = first.total_time(), budget, "one unit is already infeasible");
        return Ok(Probe { quantity: 0, ..first });
    }

    let mut best = first;
    let mut low = 1u64;
    let mut high = settings.search_bound();
    let mut iterations = 0;
    while low < high && iterations < settings.iterations() {
        iterations += 1;
        let mid = low + (high - low).div_ceil(2);
        let probe = Probe::run(engine, item, mid)?;
        let feasible = probe.is_feasible(budget);
        debug!(item = %item, mid, feasible, total_time = probe.total_time(), "optimizer probe");
        if feasible {
            low = mid;
            best = probe;
        } else {
            high = mid - 1;
        }
    }
    Ok(best)
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub item_name: ItemId,
    pub max_feasible_quantity: u64,
    #[serde(with = "wire::float")]
    pub cost_at_optimal_qty: f64,
    #[serde(with = "wire::float")]
    pub revenue_at_optimal_qty: f64,
    #[serde(with = "wire::float")]
    pub max_profit: f64,
    #[serde(with = "wire::float")]
    pub total_cycle_time_at_optimal_qty: f64,
    #[serde(with = "wire::float")]
    pub acquisition_time: f64,
    #[serde(with = "wire::float")]
    pub sale_time: f64,
    pub bottleneck_ingredient: Option<ItemId>,
    #[serde(with = "wire::float")]
    pub bottleneck_ingredient_qty: f64,
    pub calculation_possible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub max_recipe_depth: usize,
}

impl OptimizationResult {
    fn failed(item: &ItemId, message: impl Into<String>) -> Self {
        Self {
            item_name: item.clone(),
            max_feasible_quantity: 0,
            cost_at_optimal_qty: f64::NAN,
            revenue_at_optimal_qty: f64::NAN,
            max_profit: f64::NAN,
            total_cycle_time_at_optimal_qty: f64::NAN,
            acquisition_time: f64::NAN,
            sale_time: f64::NAN,
            bottleneck_ingredient: None,
            bottleneck_ingredient_qty: 0.0,
            calculation_possible: false,
            error_message: Some(message.into()),
            max_recipe_depth: 0,
        }
    }
}

pub fn optimize_item(engine: &Engine<'_>, item: &ItemId, settings: &OptimizerSettings) -> Result<OptimizationResult> {
    let Some(quote) = engine.snapshot().quote(item) else {
        return Ok(OptimizationResult::failed(item, "not listed on market"));
    };
    let sell_price = quote.insta_buy_price;

    let probe = find_max_quantity(engine, item, settings)?;
    let primary = &probe.resolution.primary_based;
    let max_recipe_depth = primary.recipe_tree.as_ref().map_or(0, |t| t.max_subtree_depth);

    if probe.quantity == 0 {
        let message = primary
            .error_message
            .clone()
            .unwrap_or_else(|| format!("one unit takes longer than the {}s budget", settings.time_budget_secs));
        return Ok(OptimizationResult {
            acquisition_time: probe.acquisition_time,
            sale_time: probe.sale_time,
            total_cycle_time_at_optimal_qty: probe.total_time(),
            bottleneck_ingredient: primary.slowest_ingredient_name.clone(),
            bottleneck_ingredient_qty: primary.slowest_ingredient_quantity,
            max_recipe_depth,
            ..OptimizationResult::failed(item, message)
        });
    }

    let quantity = probe.quantity as f64;
    let cost = primary.total_cost;
    let revenue = sell_price * quantity;
    Ok(OptimizationResult {
        item_name: item.clone(),
        max_feasible_quantity: probe.quantity,
        cost_at_optimal_qty: cost,
        revenue_at_optimal_qty: revenue,
        max_profit: revenue - cost,
        total_cycle_time_at_optimal_qty: probe.total_time(),
        acquisition_time: probe.acquisition_time,
        sale_time: probe.sale_time,
        bottleneck_ingredient: primary.slowest_ingredient_name.clone(),
        bottleneck_ingredient_qty: primary.slowest_ingredient_quantity,
        calculation_possible: true,
        error_message: None,
        max_recipe_depth,
    })
}

/// Optimize every item in parallel and rank them: feasible first, then by
/// profit descending, then by name.
pub fn optimize_all(engine: &Engine<'_>, items: &[ItemId], settings: &OptimizerSettings) -> Vec<OptimizationResult> {
    if items.is_empty() {
        return Vec::new();
    }
    let started = Instant::now();

    let mut results: Vec<OptimizationResult> = items
        .par_iter()
        .map(|item| {
            optimize_item(engine, item, settings)
                .unwrap_or_else(|e| OptimizationResult::failed(item, e.to_string()))
        })
        .collect();
    results.sort_by(rank);

    info!(
        items = results.len(),
        feasible = results.iter().filter(|r| r.calculation_possible).count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch optimization complete"
    );
    results
}

fn rank(a: &OptimizationResult, b: &OptimizationResult) -> Ordering {
    b.calculation_possible
        .cmp(&a.calculation_possible)
        .then_with(|| profit_descending(a.max_profit, b.max_profit))
        .then_with(|| a.item_name.cmp(&b.item_name))
}

fn profit_descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

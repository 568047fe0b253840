//! Quantity optimizer tests.

mod support;

use craftcost::calculator::Engine;
use craftcost::optimizer::{OptimizerSettings, find_max_quantity, optimize_all, optimize_item};
use craftcost::recipe::InMemoryRecipes;

use support::{Market, assert_close, id, metrics, quote};

/// "O" fills one unit per second by buy order and resells one unit per
/// second, so q units take 2q seconds in total.
fn market() -> craftcost::MarketSnapshot {
    Market::new()
        .quote("O", quote(10.0, 12.0, 604_800.0))
        .metrics("O", metrics(20.0, 1.0, 0.0, 0.0))
        .quote("S", quote(10.0, 12.0, 0.0))
        .metrics("S", metrics(20.0, 1.0, 0.0, 0.0))
        .build()
}

fn settings(budget: f64) -> OptimizerSettings {
    OptimizerSettings { time_budget_secs: budget, ..OptimizerSettings::default() }
}

#[test]
fn finds_largest_quantity_within_budget() {
    let market = market();
    let recipes = InMemoryRecipes::new();
    let engine = Engine::new(&market, &recipes);

    let result = optimize_item(&engine, &id("O"), &settings(100.0)).unwrap();

    assert!(result.calculation_possible);
    assert_eq!(result.max_feasible_quantity, 50);
    assert_close(result.cost_at_optimal_qty, 500.0);
    assert_close(result.revenue_at_optimal_qty, 600.0);
    assert_close(result.max_profit, 100.0);
    assert_close(result.total_cycle_time_at_optimal_qty, 100.0);
    assert_eq!(result.bottleneck_ingredient, Some(id("O")));
    assert_eq!(result.bottleneck_ingredient_qty, 50.0);
}

#[test]
fn search_bound_caps_quantity() {
    let market = market();
    let recipes = InMemoryRecipes::new();
    let engine = Engine::new(&market, &recipes);
    let settings = OptimizerSettings { max_search_qty: 30.0, ..settings(100.0) };

    assert_eq!(find_max_quantity(&engine, &id("O"), &settings).unwrap().quantity, 30);
}

#[test]
fn iteration_cap_stops_the_search() {
    let market = market();
    let recipes = InMemoryRecipes::new();
    let engine = Engine::new(&market, &recipes);
    let settings = OptimizerSettings { max_iterations: 1, ..settings(100.0) };

    // The single probe lands far above the budget, leaving the first unit.
    assert_eq!(find_max_quantity(&engine, &id("O"), &settings).unwrap().quantity, 1);
}

#[test]
fn infeasible_first_unit_returns_zero() {
    let market = market();
    let recipes = InMemoryRecipes::new();
    let engine = Engine::new(&market, &recipes);

    assert_eq!(find_max_quantity(&engine, &id("S"), &settings(100.0)).unwrap().quantity, 0);

    let result = optimize_item(&engine, &id("S"), &settings(100.0)).unwrap();
    assert!(!result.calculation_possible);
    assert_eq!(result.max_feasible_quantity, 0);
    assert_eq!(result.sale_time, f64::INFINITY);
    assert!(result.error_message.unwrap().contains("budget"));
}

#[test]
fn batch_ranks_feasible_items_first() {
    let market = market();
    let recipes = InMemoryRecipes::new();
    let engine = Engine::new(&market, &recipes);

    let items = [id("UNLISTED"), id("S"), id("O")];
    let results = optimize_all(&engine, &items, &settings(100.0));

    let names: Vec<_> = results.iter().map(|r| r.item_name.as_str()).collect();
    assert_eq!(names, ["O", "S", "UNLISTED"]);
    assert_eq!(results[2].error_message.as_deref(), Some("not listed on market"));

    assert!(optimize_all(&engine, &[], &settings(100.0)).is_empty());
}

//! Recipe tree resolver tests.

mod support;

use craftcost::calculator::{Engine, aggregate_base_ingredients, analyze_tree, collect_base_quantities, format_tree};
use craftcost::cost;
use craftcost::error::Error;
use craftcost::models::{CycleKind, Method};
use craftcost::recipe::{InMemoryRecipes, RecipeDir, RecipeFile, RecipeGrid};

use support::{Market, assert_close, draining, id};

#[test]
fn ingredient_demand_scales_with_crafts() {
    let market = Market::new().listed("X", 1.0, 2.0).listed("Y", 3.0, 4.0).build();
    let recipes = InMemoryRecipes::new().with_grid("C", &[("A1", "X:2"), ("B1", "Y:3")], Some(1));
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("C"), 5.0).unwrap();

    assert!(!tree.is_base_component);
    assert_eq!(tree.num_crafts, Some(5.0));
    let demand: Vec<_> = tree.children.iter().map(|c| (c.item.as_str(), c.quantity_needed)).collect();
    assert_eq!(demand, [("X", 10.0), ("Y", 15.0)]);
    assert!(tree.children.iter().all(|c| c.is_base_component));
}

#[test]
fn yield_rounds_crafts_up() {
    let market = Market::new().listed("WHEAT", 1.0, 2.0).build();
    let recipes = InMemoryRecipes::new().with_grid("BREAD", &[("A1", "WHEAT:3")], Some(4));
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("BREAD"), 5.0).unwrap();
    assert_eq!(tree.num_crafts, Some(2.0));
    assert_eq!(tree.children[0].quantity_needed, 6.0);
}

#[test]
fn self_cycle_is_costed_at_first_quantity() {
    let market = Market::new().listed("D", 10.0, 12.0).build();
    let recipes = InMemoryRecipes::new().with_grid("D", &[("A1", "D:2")], None);
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("D"), 4.0).unwrap();

    assert!(!tree.is_base_component);
    let child = &tree.children[0];
    assert!(child.is_base_component);
    assert_eq!(child.quantity_needed, 8.0);
    assert_eq!(child.cycle, Some(CycleKind::TopLevel));
    let acquisition = child.acquisition.as_ref().unwrap();
    assert_eq!(acquisition.quantity, 4.0);
    assert_eq!(acquisition.best_cost, 40.0);
    assert!(tree.cycles_to_top_level());
}

#[test]
fn intermediate_cycle_terminates() {
    let recipes = InMemoryRecipes::new()
        .with_grid("A", &[("A1", "B")], None)
        .with_grid("B", &[("A1", "C:2")], None)
        .with_grid("C", &[("A1", "B:3")], None);
    let market = Market::new().build();
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("A"), 1.0).unwrap();

    let b = &tree.children[0];
    let c = &b.children[0];
    let cycled = &c.children[0];
    assert_eq!(cycled.item, id("B"));
    assert_eq!(cycled.cycle, Some(CycleKind::Intermediate));
    assert_eq!(cycled.acquisition.as_ref().unwrap().quantity, 1.0);
    assert!(!tree.cycles_to_top_level());
    assert_eq!(tree.node_count(), 4);
    assert_eq!(tree.max_subtree_depth, 3);
}

#[test]
fn shared_base_is_costed_once_at_total_quantity() {
    let market = Market::new().listed("X", 10.0, 1000.0).metrics("X", draining()).build();
    let recipes = InMemoryRecipes::new()
        .with_grid("T", &[("A1", "P"), ("A2", "Q")], None)
        .with_grid("P", &[("A1", "X:3")], None)
        .with_grid("Q", &[("A1", "X:5")], None);
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("T"), 1.0).unwrap();
    assert_eq!(collect_base_quantities(&tree).get(&id("X")), Some(&8.0));

    let bases = aggregate_base_ingredients(&market, &tree).unwrap();
    let x = &bases[&id("X")];
    assert_eq!(x.quantity, 8.0);

    let once = cost::evaluate(&market, &id("X"), 8.0).unwrap().best_cost;
    let split = cost::evaluate(&market, &id("X"), 3.0).unwrap().best_cost
        + cost::evaluate(&market, &id("X"), 5.0).unwrap().best_cost;
    assert_close(x.best_cost, once);
    assert!((once - split).abs() > 1.0, "depletion should make the split cheaper");
}

#[test]
fn insta_buy_winner_is_not_expanded() {
    // Buy order for 3 costs 92.5 on a draining book; insta-buy is 33.
    let market = Market::new().listed("G", 10.0, 11.0).metrics("G", draining()).build();
    let recipes = InMemoryRecipes::new().with_grid("G", &[("A1", "X:1")], None);
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("G"), 3.0).unwrap();
    assert!(tree.is_base_component);
    assert_eq!(tree.acquisition.as_ref().unwrap().method, Method::InstaBuy);

    let forced = engine.craft_tree(&id("G"), 3.0).unwrap();
    assert!(!forced.is_base_component);
}

#[test]
fn unlisted_good_without_recipe_is_unavailable_base() {
    let market = Market::new().build();
    let recipes = InMemoryRecipes::new();
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("NOTHING"), 2.0).unwrap();
    assert!(tree.is_base_component);
    let acquisition = tree.acquisition.as_ref().unwrap();
    assert_eq!(acquisition.method, Method::Unavailable);
    assert_eq!(tree.note.as_deref(), Some("no recipe"));

    let analysis = analyze_tree(&market, &tree).unwrap();
    assert!(!analysis.possible);
    assert_eq!(analysis.total_cost, f64::INFINITY);
}

#[test]
fn unusable_recipe_becomes_base_with_note() {
    let market = Market::new().listed("E", 5.0, 6.0).build();
    let mut recipes = InMemoryRecipes::new();
    recipes.insert(
        id("E"),
        RecipeFile { itemid: "E".into(), recipe: Some(RecipeGrid::default()), ..RecipeFile::default() },
    );
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("E"), 1.0).unwrap();
    assert!(tree.is_base_component);
    assert_eq!(tree.note.as_deref(), Some("no usable recipe content"));
    assert_eq!(tree.acquisition.as_ref().unwrap().best_cost, 5.0);
}

#[test]
fn unreadable_recipe_store_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("recipes");
    std::fs::write(&not_a_dir, "plain file").unwrap();
    let recipes = RecipeDir::new(not_a_dir);
    let market = Market::new().build();
    let engine = Engine::new(&market, &recipes);

    let err = engine.expand_to_tree(&id("ANY"), 1.0).unwrap_err();
    assert!(matches!(err, Error::RecipeStore { .. }));
}

#[test]
fn analysis_sums_bases_and_finds_slowest() {
    // X fills at 20*q/net with net 10 -> 20s for 10 units; Y has no flow.
    let market = Market::new()
        .listed("X", 1.0, 2.0)
        .metrics("X", support::metrics(10.0, 1.0, 0.0, 0.0))
        .listed("Y", 3.0, 4.0)
        .build();
    let recipes = InMemoryRecipes::new().with_grid("C", &[("A1", "X:2"), ("B1", "Y:3")], Some(1));
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("C"), 5.0).unwrap();
    let analysis = analyze_tree(&market, &tree).unwrap();

    assert!(analysis.possible);
    assert_close(analysis.total_cost, 10.0 * 1.0 + 15.0 * 3.0);
    let slowest = analysis.slowest.unwrap();
    assert_eq!(slowest.item, id("Y"));
    assert_eq!(slowest.fill_time, f64::INFINITY);
    assert!(analysis.notes.iter().any(|n| n.contains("never fills")));
}

#[test]
fn tree_format_lists_every_node() {
    let market = Market::new().listed("X", 1.0, 2.0).listed("Y", 3.0, 4.0).build();
    let recipes = InMemoryRecipes::new().with_grid("C", &[("A1", "X:2"), ("B1", "Y:3")], Some(1));
    let engine = Engine::new(&market, &recipes);

    let tree = engine.expand_to_tree(&id("C"), 5.0).unwrap();
    let text = format_tree(&tree, 0);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("+ 5x C"));
    assert!(lines[1].starts_with("  - 10x X via buy order"));
}

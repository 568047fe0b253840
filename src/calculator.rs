//! Recipe tree resolver
//!
//! Expands a good into a tree of buy-or-craft decisions, then aggregates the
//! leaves so every base ingredient is costed once at its total quantity.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::cost;
use crate::error::Result;
use crate::fill_time;
use crate::item_id::ItemId;
use crate::market::MarketSnapshot;
use crate::models::{AcquisitionDetail, CraftingNode, CycleKind, Method, format_cost, format_duration};
use crate::recipe::{RecipeLookup, RecipeSource};

/// Everything a resolution reads: one market snapshot and one recipe source.
#[derive(Clone, Copy)]
pub struct Engine<'a> {
    snapshot: &'a MarketSnapshot,
    recipes: &'a dyn RecipeSource,
}

impl<'a> Engine<'a> {
    pub fn new(snapshot: &'a MarketSnapshot, recipes: &'a dyn RecipeSource) -> Self {
        Self { snapshot, recipes }
    }

    pub fn snapshot(&self) -> &'a MarketSnapshot {
        self.snapshot
    }

    pub fn recipes(&self) -> &'a dyn RecipeSource {
        self.recipes
    }

    /// Resolve `item`, deciding buy-or-craft at every node including the root.
    pub fn expand_to_tree(&self, item: &ItemId, quantity: f64) -> Result<CraftingNode> {
        self.expand(item, quantity, &ExpansionPath::Root, item, 0, false)
    }

    /// Resolve `item` as crafted: the root is expanded whenever it has a
    /// usable recipe, and the nodes below decide for themselves.
    pub fn craft_tree(&self, item: &ItemId, quantity: f64) -> Result<CraftingNode> {
        self.expand(item, quantity, &ExpansionPath::Root, item, 0, true)
    }

    fn expand<'p>(
        &self,
        item: &'p ItemId,
        quantity: f64,
        path: &'p ExpansionPath<'p>,
        root: &ItemId,
        depth: usize,
        force: bool,
    ) -> Result<CraftingNode> {
        if let Some(first_quantity) = path.quantity_of(item) {
            let kind = if item == root { CycleKind::TopLevel } else { CycleKind::Intermediate };
            debug!(item = %item, depth, first_quantity, ?kind, "cycle detected");
            let acquisition = cost::evaluate(self.snapshot, item, first_quantity)?;
            let mut node = CraftingNode::base(item.clone(), quantity, depth, acquisition);
            node.cycle = Some(kind);
            node.push_note(match kind {
                CycleKind::TopLevel => "cycle back to top-level good",
                CycleKind::Intermediate => "cycle back to intermediate good",
            });
            return Ok(node);
        }

        let acquisition = cost::evaluate(self.snapshot, item, quantity)?;
        if quantity <= 0.0 {
            return Ok(CraftingNode::base(item.clone(), quantity, depth, acquisition));
        }

        let recipe = match self.recipes.lookup(item)? {
            RecipeLookup::Found(recipe) => recipe,
            RecipeLookup::Missing => {
                let mut node = CraftingNode::base(item.clone(), quantity, depth, acquisition);
                if node.acquisition.as_ref().is_some_and(|a| !a.is_valid()) {
                    node.push_note("no recipe");
                }
                return Ok(node);
            }
            RecipeLookup::Unusable(reason) => {
                let mut node = CraftingNode::base(item.clone(), quantity, depth, acquisition);
                node.push_note(reason);
                return Ok(node);
            }
        };

        // Insta-buy beating the buy order means buying wins outright.
        let expand = force || acquisition.method != Method::InstaBuy;
        debug!(item = %item, quantity, depth, method = ?acquisition.method, expand, "expand-or-buy");
        if !expand {
            return Ok(CraftingNode::base(item.clone(), quantity, depth, acquisition));
        }

        let crafts = recipe.crafts_for(quantity);
        let child_path = path.push(item, quantity);
        let mut node = CraftingNode {
            item: item.clone(),
            quantity_needed: quantity,
            is_base_component: false,
            acquisition: None,
            quantity_per_craft: Some(recipe.yield_per_craft),
            num_crafts: Some(crafts),
            children: Vec::with_capacity(recipe.ingredients.len()),
            depth,
            max_subtree_depth: depth,
            cycle: None,
            note: None,
        };
        for note in &recipe.notes {
            node.push_note(note.as_str());
        }

        for (ingredient, per_craft) in &recipe.ingredients {
            let needed = per_craft * crafts;
            if needed <= 0.0 {
                continue;
            }
            let child = self.expand(ingredient, needed, &child_path, root, depth + 1, false)?;
            node.max_subtree_depth = node.max_subtree_depth.max(child.max_subtree_depth);
            node.children.push(child);
        }

        Ok(node)
    }
}

/// Goods visited on the current recursion branch, innermost first.
///
/// Pushing returns a new path that borrows its parent, so sibling branches
/// never see each other's entries.
#[derive(Debug, Clone, Copy)]
pub enum ExpansionPath<'a> {
    Root,
    Step {
        item: &'a ItemId,
        quantity: f64,
        parent: &'a ExpansionPath<'a>,
    },
}

impl<'a> ExpansionPath<'a> {
    pub fn push(&'a self, item: &'a ItemId, quantity: f64) -> ExpansionPath<'a> {
        ExpansionPath::Step { item, quantity, parent: self }
    }

    /// Quantity recorded where `item` first appears on this path.
    pub fn quantity_of(&self, item: &ItemId) -> Option<f64> {
        let mut current = self;
        while let ExpansionPath::Step { item: seen, quantity, parent } = current {
            if *seen == item {
                return Some(*quantity);
            }
            current = *parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        match self {
            ExpansionPath::Root => 0,
            ExpansionPath::Step { parent, .. } => 1 + parent.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ExpansionPath::Root)
    }
}

/// Total quantity of each base component across all branches of `tree`.
pub fn collect_base_quantities(tree: &CraftingNode) -> BTreeMap<ItemId, f64> {
    let mut totals = BTreeMap::new();
    collect_leaves(tree, &mut |node: &CraftingNode| {
        let qty = node.acquisition.as_ref().map_or(node.quantity_needed, |a| a.quantity);
        *totals.entry(node.item.clone()).or_insert(0.0) += qty;
    });
    totals
}

fn collect_leaves(node: &CraftingNode, visit: &mut impl FnMut(&CraftingNode)) {
    if node.is_base_component {
        visit(node);
        return;
    }
    for child in &node.children {
        collect_leaves(child, visit);
    }
}

/// Base ingredients of `tree`, each re-costed once at its aggregated quantity.
pub fn aggregate_base_ingredients(
    snapshot: &MarketSnapshot,
    tree: &CraftingNode,
) -> Result<BTreeMap<ItemId, AcquisitionDetail>> {
    let mut notes: BTreeMap<ItemId, Vec<String>> = BTreeMap::new();
    collect_leaves(tree, &mut |node: &CraftingNode| {
        if let Some(note) = &node.note {
            notes.entry(node.item.clone()).or_default().push(note.clone());
        }
    });

    let mut details = BTreeMap::new();
    for (item, quantity) in collect_base_quantities(tree) {
        let mut detail = cost::evaluate(snapshot, &item, quantity)?;
        for note in notes.remove(&item).unwrap_or_default() {
            detail.push_note(note);
        }
        details.insert(item, detail);
    }
    Ok(details)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlowestIngredient {
    pub item: ItemId,
    pub quantity: f64,
    pub fill_time: f64,
}

/// Costs and timing derived from a resolved tree.
#[derive(Debug, Clone)]
pub struct TreeAnalysis {
    pub base_ingredients: BTreeMap<ItemId, AcquisitionDetail>,
    /// Sum of aggregated base costs; infinite if any base is unobtainable.
    pub total_cost: f64,
    pub slowest: Option<SlowestIngredient>,
    /// Every base ingredient has a valid cost.
    pub possible: bool,
    pub notes: Vec<String>,
}

impl TreeAnalysis {
    pub fn slowest_fill_time(&self) -> f64 {
        self.slowest.as_ref().map_or(0.0, |s| s.fill_time)
    }
}

pub fn analyze_tree(snapshot: &MarketSnapshot, tree: &CraftingNode) -> Result<TreeAnalysis> {
    let base_ingredients = aggregate_base_ingredients(snapshot, tree)?;
    let mut notes = Vec::new();
    let mut possible = !base_ingredients.is_empty();
    if base_ingredients.is_empty() {
        notes.push("no base ingredients".to_string());
    }

    let mut total_cost = 0.0;
    let mut slowest: Option<SlowestIngredient> = None;
    for (item, detail) in &base_ingredients {
        if detail.is_valid() {
            total_cost += detail.best_cost;
        } else {
            possible = false;
            total_cost = f64::INFINITY;
            notes.push(format!("invalid cost for base ingredient {}", item));
        }

        let fill_time = fill_time::acquisition_fill_time(snapshot, item, detail);
        if fill_time.is_infinite() && detail.is_valid() {
            notes.push(format!("{} never fills at this quantity", item));
        }
        if slowest.as_ref().is_none_or(|s| fill_time > s.fill_time) {
            slowest = Some(SlowestIngredient { item: item.clone(), quantity: detail.quantity, fill_time });
        }
    }

    Ok(TreeAnalysis { base_ingredients, total_cost, slowest, possible, notes })
}

/// Render a resolved tree, one node per line.
pub fn format_tree(node: &CraftingNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    if node.is_base_component {
        let (method, cost) = node
            .acquisition
            .as_ref()
            .map_or(("unresolved".to_string(), f64::INFINITY), |a| (a.method.to_string(), a.best_cost));
        output.push_str(&format!(
            "{}- {:.0}x {} via {} ({})",
            prefix,
            node.quantity_needed,
            node.item,
            method,
            format_cost(cost)
        ));
    } else {
        output.push_str(&format!(
            "{}+ {:.0}x {} (craft {:.0} x{:.0})",
            prefix,
            node.quantity_needed,
            node.item,
            node.num_crafts.unwrap_or(0.0),
            node.quantity_per_craft.unwrap_or(1.0)
        ));
    }
    if let Some(note) = &node.note {
        output.push_str(&format!("  [{}]", note));
    }
    output.push('\n');

    for child in &node.children {
        output.push_str(&format_tree(child, indent + 1));
    }
    output
}

/// Summary of one resolved tree
#[derive(Debug)]
pub struct CostSummary {
    pub item: ItemId,
    pub quantity: f64,
    pub node_count: usize,
    pub max_depth: usize,
    pub analysis: TreeAnalysis,
}

pub fn summarize_tree(snapshot: &MarketSnapshot, tree: &CraftingNode) -> Result<CostSummary> {
    Ok(CostSummary {
        item: tree.item.clone(),
        quantity: tree.quantity_needed,
        node_count: tree.node_count(),
        max_depth: tree.max_subtree_depth,
        analysis: analyze_tree(snapshot, tree)?,
    })
}

impl fmt::Display for CostSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cost Summary ===")?;
        writeln!(f, "Target: {:.0}x {}", self.quantity, self.item)?;
        writeln!(f, "Tree: {} nodes, depth {}", self.node_count, self.max_depth)?;
        writeln!(f)?;

        writeln!(f, "Base ingredients:")?;
        for (item, detail) in &self.analysis.base_ingredients {
            writeln!(
                f,
                "  {:<32} {:>10.0}  {:<12} {:>14}",
                item.as_str(),
                detail.quantity,
                detail.method.to_string(),
                format_cost(detail.best_cost)
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Total cost: {}", format_cost(self.analysis.total_cost))?;
        if let Some(slowest) = &self.analysis.slowest {
            writeln!(
                f,
                "Slowest:    {} x{:.0} ({})",
                slowest.item,
                slowest.quantity,
                format_duration(slowest.fill_time)
            )?;
        }
        for note in &self.analysis.notes {
            writeln!(f, "Note: {}", note)?;
        }
        Ok(())
    }
}

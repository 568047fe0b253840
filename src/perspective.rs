//! Dual-perspective orchestration
//!
//! Two top-level policies bracket what a trader can actually do with a good:
//!
//! * **primary** takes the global minimum over crafting, a buy order and an
//!   insta-buy.
//! * **secondary** prefers a buy order and only crafts when crafting is
//!   strictly cheaper.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::calculator::{Engine, TreeAnalysis, analyze_tree};
use crate::cost::{self, CostBreakdown};
use crate::error::{Error, Result};
use crate::fill_time;
use crate::item_id::ItemId;
use crate::market::MarketSnapshot;
use crate::models::{
    AcquisitionDetail, CraftingNode, Decision, FillParams, Method, format_cost, format_duration, is_valid_cost,
};
use crate::recipe::RecipeLookup;
use crate::wire::{self, WireF64};

/// Reject quantities no resolution can be asked for.
pub fn validate_quantity(item: &ItemId, quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidQuantity { item: item.to_string(), quantity });
    }
    Ok(())
}

/// The good resolved with its root forced into a craft.
#[derive(Debug, Clone)]
pub struct CraftOption {
    pub tree: CraftingNode,
    pub analysis: TreeAnalysis,
    pub cycles_to_root: bool,
}

impl CraftOption {
    pub fn resolve(engine: &Engine<'_>, item: &ItemId, quantity: f64) -> Result<Self> {
        let tree = engine.craft_tree(item, quantity)?;
        let analysis = analyze_tree(engine.snapshot(), &tree)?;
        let cycles_to_root = tree.cycles_to_top_level();
        Ok(Self { tree, analysis, cycles_to_root })
    }

    pub fn cost(&self) -> f64 {
        self.analysis.total_cost
    }

    pub fn is_valid(&self) -> bool {
        !self.tree.is_base_component
            && !self.cycles_to_root
            && self.analysis.possible
            && is_valid_cost(self.analysis.total_cost)
    }

    pub fn problem(&self) -> Option<String> {
        if self.tree.is_base_component {
            Some("recipe could not be expanded".to_string())
        } else if self.cycles_to_root {
            Some(format!("recipe cycles back to {}", self.tree.item))
        } else if !self.analysis.possible || !is_valid_cost(self.analysis.total_cost) {
            Some(format!("craft cost unavailable: {}", self.analysis.notes.join("; ")))
        } else {
            None
        }
    }
}

/// One perspective's answer.
#[derive(Debug, Clone, Serialize)]
pub struct PerspectiveResult {
    pub decision: Decision,
    pub base_ingredients: BTreeMap<ItemId, AcquisitionDetail>,
    #[serde(with = "wire::float")]
    pub total_cost: f64,
    pub top_level_action: &'static str,
    pub final_cost_method: &'static str,
    pub calculation_possible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(with = "wire::float")]
    pub top_level_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_level_rr: Option<WireF64>,
    #[serde(with = "wire::float")]
    pub slowest_ingredient_buy_time_seconds: f64,
    pub slowest_ingredient_name: Option<ItemId>,
    #[serde(with = "wire::float")]
    pub slowest_ingredient_quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_tree: Option<CraftingNode>,
}

/// Both perspectives for one (good, quantity) request.
#[derive(Debug, Clone, Serialize)]
pub struct DualResolution {
    pub item_name: ItemId,
    #[serde(with = "wire::float")]
    pub quantity: f64,
    pub primary_based: PerspectiveResult,
    pub secondary_based: PerspectiveResult,
    #[serde(with = "wire::float")]
    pub top_level_instasell_time_seconds: f64,
    pub warnings: Vec<String>,
    /// A result is present but some part of it fell back or was skipped.
    pub degraded: bool,
}

pub fn resolve_dual(engine: &Engine<'_>, item: &ItemId, quantity: f64) -> Result<DualResolution> {
    validate_quantity(item, quantity)?;
    let snapshot = engine.snapshot();

    let instasell_time = fill_time::top_level_instasell_time(snapshot, item, quantity);
    let direct = cost::direct_costs(snapshot, item, quantity)?;
    let (craft, recipe_issue) = match engine.recipes().lookup(item)? {
        RecipeLookup::Found(_) => (Some(CraftOption::resolve(engine, item, quantity)?), None),
        RecipeLookup::Missing => (None, None),
        RecipeLookup::Unusable(reason) => (None, Some(reason)),
    };

    let primary = primary_decision(direct.as_ref(), craft.as_ref(), recipe_issue.as_deref());
    let secondary = secondary_decision(direct.as_ref(), craft.as_ref(), recipe_issue.as_deref());
    debug!(item = %item, quantity, primary = %primary, secondary = %secondary, "perspectives decided");

    let top_level_rr = direct.as_ref().map(|d| d.refill_rounds).filter(|rr| rr.is_finite()).map(WireF64);
    let primary_based = build_result(
        snapshot,
        item,
        quantity,
        primary,
        craft.as_ref(),
        direct.as_ref().map_or(f64::INFINITY, |d| d.buy_order),
        top_level_rr,
    );
    let secondary_based = build_result(
        snapshot,
        item,
        quantity,
        secondary,
        craft.as_ref(),
        direct.as_ref().map_or(f64::INFINITY, |d| d.insta_buy),
        top_level_rr,
    );

    let mut warnings = Vec::new();
    if let Some(reason) = &recipe_issue {
        warnings.push(format!("{}: {}", item, reason));
    }
    if let Some(craft) = &craft {
        craft.tree.collect_notes(&mut warnings);
    }
    if direct.as_ref().is_some_and(|d| d.metrics_missing) {
        warnings.push(format!("{}: metrics missing", item));
    }
    for (label, result) in [("primary", &primary_based), ("secondary", &secondary_based)] {
        if let Some(message) = &result.error_message {
            warnings.push(format!("{}: {}", label, message));
        }
    }
    warnings.dedup();
    let degraded = !warnings.is_empty();
    if degraded {
        warn!(item = %item, quantity, warnings = warnings.len(), "resolution degraded");
    }

    Ok(DualResolution {
        item_name: item.clone(),
        quantity,
        primary_based,
        secondary_based,
        top_level_instasell_time_seconds: instasell_time,
        warnings,
        degraded,
    })
}

fn buy_order(d: &CostBreakdown) -> Decision {
    Decision::BuyOrder { cost: d.buy_order, refill_rounds: d.refill_rounds, instant_fill_qty: d.instant_fill_qty }
}

fn unobtainable(direct: Option<&CostBreakdown>, craft: Option<&CraftOption>, recipe_issue: Option<&str>) -> Decision {
    let mut reason = match direct {
        None => "not listed on market".to_string(),
        Some(_) => "no valid direct cost".to_string(),
    };
    match craft.and_then(CraftOption::problem) {
        Some(problem) => {
            reason.push_str("; ");
            reason.push_str(&problem);
        }
        None if craft.is_none() => {
            reason.push_str("; ");
            reason.push_str(recipe_issue.unwrap_or("no recipe"));
        }
        None => {}
    }
    Decision::Unobtainable { reason }
}

/// Cheapest valid option. Earlier candidates win ties: craft, then buy
/// order, then insta-buy. `recipe_issue` is why the good's own recipe was
/// unusable, reported if nothing is obtainable.
pub fn primary_decision(
    direct: Option<&CostBreakdown>,
    craft: Option<&CraftOption>,
    recipe_issue: Option<&str>,
) -> Decision {
    let candidates = [
        craft.filter(|c| c.is_valid()).map(|c| Decision::Craft { cost: c.cost() }),
        direct.filter(|d| is_valid_cost(d.buy_order)).map(buy_order),
        direct.filter(|d| is_valid_cost(d.insta_buy)).map(|d| Decision::InstaBuy { cost: d.insta_buy }),
    ];

    let mut best: Option<Decision> = None;
    for candidate in candidates.into_iter().flatten() {
        if best.as_ref().is_none_or(|b| candidate.cost() < b.cost()) {
            best = Some(candidate);
        }
    }
    best.unwrap_or_else(|| unobtainable(direct, craft, recipe_issue))
}

/// Buy order unless crafting is strictly cheaper; insta-buy only as a
/// fallback when neither a buy order nor a craft is possible.
pub fn secondary_decision(
    direct: Option<&CostBreakdown>,
    craft: Option<&CraftOption>,
    recipe_issue: Option<&str>,
) -> Decision {
    let Some(d) = direct else {
        return match craft {
            Some(c) if c.is_valid() => Decision::Craft { cost: c.cost() },
            _ => unobtainable(direct, craft, recipe_issue),
        };
    };

    let craft_cost = craft.filter(|c| c.is_valid()).map(CraftOption::cost);
    if is_valid_cost(d.buy_order) && craft_cost.is_none_or(|c| d.buy_order <= c) {
        return buy_order(d);
    }
    if let Some(cost) = craft_cost {
        return Decision::Craft { cost };
    }

    // Craft cycled or failed; fall back to direct buys.
    if is_valid_cost(d.buy_order) {
        buy_order(d)
    } else if is_valid_cost(d.insta_buy) {
        Decision::InstaBuy { cost: d.insta_buy }
    } else {
        unobtainable(direct, craft, recipe_issue)
    }
}

fn build_result(
    snapshot: &MarketSnapshot,
    item: &ItemId,
    quantity: f64,
    decision: Decision,
    craft: Option<&CraftOption>,
    top_level_cost: f64,
    top_level_rr: Option<WireF64>,
) -> PerspectiveResult {
    let mut result = PerspectiveResult {
        top_level_action: decision.top_level_action(),
        final_cost_method: decision.final_cost_method(),
        total_cost: decision.cost(),
        decision,
        base_ingredients: BTreeMap::new(),
        calculation_possible: true,
        error_message: None,
        top_level_cost,
        top_level_rr,
        slowest_ingredient_buy_time_seconds: 0.0,
        slowest_ingredient_name: None,
        slowest_ingredient_quantity: 0.0,
        recipe_tree: None,
    };

    match &result.decision {
        Decision::Craft { .. } => {
            if let Some(craft) = craft {
                result.base_ingredients = craft.analysis.base_ingredients.clone();
                if let Some(slowest) = &craft.analysis.slowest {
                    result.slowest_ingredient_buy_time_seconds = slowest.fill_time;
                    result.slowest_ingredient_name = Some(slowest.item.clone());
                    result.slowest_ingredient_quantity = slowest.quantity;
                }
                result.recipe_tree = Some(craft.tree.clone());
            }
        }
        Decision::BuyOrder { cost, refill_rounds, instant_fill_qty } => {
            let metrics = snapshot.metrics(item);
            let detail = AcquisitionDetail {
                quantity,
                method: Method::BuyOrder,
                best_cost: *cost,
                fill: metrics.map(|m| FillParams {
                    instant_fill_qty: *instant_fill_qty,
                    refill_rounds: *refill_rounds,
                    supply_minus_demand: m.net_flow(),
                }),
                note: None,
            };
            result.slowest_ingredient_buy_time_seconds =
                fill_time::acquisition_fill_time(snapshot, item, &detail);
            result.slowest_ingredient_name = Some(item.clone());
            result.slowest_ingredient_quantity = quantity;
            result.base_ingredients.insert(item.clone(), detail);
        }
        Decision::InstaBuy { cost } => {
            let detail = AcquisitionDetail { quantity, method: Method::InstaBuy, best_cost: *cost, fill: None, note: None };
            result.slowest_ingredient_name = Some(item.clone());
            result.slowest_ingredient_quantity = quantity;
            result.base_ingredients.insert(item.clone(), detail);
        }
        Decision::Unobtainable { reason } => {
            result.calculation_possible = false;
            result.error_message = Some(reason.clone());
            result.recipe_tree = craft.map(|c| c.tree.clone());
        }
    }
    result
}

impl fmt::Display for PerspectiveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Decision:     {}", self.decision)?;
        writeln!(f, "  Total cost:   {}", format_cost(self.total_cost))?;
        writeln!(f, "  Top-level:    {} ({})", self.top_level_action, format_cost(self.top_level_cost))?;
        if let Some(name) = &self.slowest_ingredient_name {
            writeln!(
                f,
                "  Slowest:      {} x{:.0} ({})",
                name,
                self.slowest_ingredient_quantity,
                format_duration(self.slowest_ingredient_buy_time_seconds)
            )?;
        }
        for (item, detail) in &self.base_ingredients {
            writeln!(
                f,
                "    {:<32} {:>10.0}  {:<12} {:>14}",
                item.as_str(),
                detail.quantity,
                detail.method.to_string(),
                format_cost(detail.best_cost)
            )?;
        }
        if let Some(message) = &self.error_message {
            writeln!(f, "  Error:        {}", message)?;
        }
        Ok(())
    }
}

impl fmt::Display for DualResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {:.0}x {} ===", self.quantity, self.item_name)?;
        writeln!(f, "Insta-sell time: {}", format_duration(self.top_level_instasell_time_seconds))?;
        writeln!(f)?;
        writeln!(f, "Global minimum:")?;
        write!(f, "{}", self.primary_based)?;
        writeln!(f)?;
        writeln!(f, "Buy order first:")?;
        write!(f, "{}", self.secondary_based)?;
        if self.degraded {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(buy: f64, insta: f64) -> CostBreakdown {
        CostBreakdown {
            buy_order: buy,
            insta_buy: insta,
            instant_fill_qty: f64::INFINITY,
            refill_rounds: 1.0,
            supply_demand_ratio: 2.0,
            adjustment_factor: 0.0,
            metrics_missing: false,
        }
    }

    #[test]
    fn rejects_bad_quantities() {
        let id = ItemId::new("A");
        assert!(validate_quantity(&id, 1.0).is_ok());
        for q in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(validate_quantity(&id, q), Err(Error::InvalidQuantity { .. })));
        }
    }

    #[test]
    fn primary_takes_cheapest_direct_option() {
        let d = breakdown(50.0, 40.0);
        assert_eq!(primary_decision(Some(&d), None, None), Decision::InstaBuy { cost: 40.0 });
        let d = breakdown(40.0, 40.0);
        assert!(matches!(primary_decision(Some(&d), None, None), Decision::BuyOrder { .. }));
    }

    #[test]
    fn nothing_valid_is_unobtainable() {
        let d = breakdown(f64::INFINITY, f64::INFINITY);
        assert!(!primary_decision(Some(&d), None, None).is_obtainable());
        let Decision::Unobtainable { reason } = secondary_decision(None, None, None) else {
            panic!("expected unobtainable");
        };
        assert!(reason.contains("not listed on market"));
        assert!(reason.ends_with("; no recipe"));
    }

    #[test]
    fn unobtainable_reason_names_unusable_recipe() {
        let decision = primary_decision(None, None, Some("no usable recipe content"));
        let Decision::Unobtainable { reason } = decision else {
            panic!("expected unobtainable");
        };
        assert_eq!(reason, "not listed on market; no usable recipe content");
    }

    #[test]
    fn secondary_falls_back_to_insta_buy() {
        let d = breakdown(f64::INFINITY, 70.0);
        assert_eq!(secondary_decision(Some(&d), None, None), Decision::InstaBuy { cost: 70.0 });
    }
}

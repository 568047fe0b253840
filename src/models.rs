//! Data models for market data, acquisition decisions and recipe trees

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::item_id::ItemId;
use crate::wire;

/// Top-of-book prices and trade volume for one good.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Best standing buy-order price (the first unit of a buy order costs this).
    pub sell_order_price: f64,
    /// Best instant-buy price.
    pub insta_buy_price: f64,
    pub moving_week_buy_volume: f64,
}

impl MarketQuote {
    /// A quote is usable only when both prices are strictly positive and finite.
    pub fn is_usable(&self) -> bool {
        is_valid_price(self.sell_order_price) && is_valid_price(self.insta_buy_price)
    }
}

pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Finite and non-negative.
pub fn is_valid_cost(cost: f64) -> bool {
    cost.is_finite() && cost >= 0.0
}

/// Supply/demand flow averages for one good.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductMetrics {
    pub listing_size: f64,
    pub listing_frequency: f64,
    pub order_size: f64,
    pub order_frequency: f64,
}

impl ProductMetrics {
    /// Every field clamped to >= 0 (NaN becomes 0).
    pub fn clamped(&self) -> Self {
        Self {
            listing_size: self.listing_size.max(0.0),
            listing_frequency: self.listing_frequency.max(0.0),
            order_size: self.order_size.max(0.0),
            order_frequency: self.order_frequency.max(0.0),
        }
    }

    pub fn supply_rate(&self) -> f64 {
        let m = self.clamped();
        m.listing_size * m.listing_frequency
    }

    pub fn demand_rate(&self) -> f64 {
        let m = self.clamped();
        m.order_size * m.order_frequency
    }

    pub fn net_flow(&self) -> f64 {
        self.supply_rate() - self.demand_rate()
    }
}

/// How a base component is acquired directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    BuyOrder,
    InstaBuy,
    Unavailable,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::BuyOrder => "buy order",
            Method::InstaBuy => "insta-buy",
            Method::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Order-book refill parameters, present when the method is a buy order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FillParams {
    #[serde(with = "wire::float")]
    pub instant_fill_qty: f64,
    #[serde(with = "wire::float")]
    pub refill_rounds: f64,
    #[serde(with = "wire::float")]
    pub supply_minus_demand: f64,
}

/// Outcome of resolving one good directly at one quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionDetail {
    pub quantity: f64,
    pub method: Method,
    #[serde(with = "wire::float")]
    pub best_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AcquisitionDetail {
    pub fn is_valid(&self) -> bool {
        self.method != Method::Unavailable && is_valid_cost(self.best_cost)
    }

    pub fn unit_cost(&self) -> f64 {
        if self.quantity > 0.0 {
            self.best_cost / self.quantity
        } else {
            0.0
        }
    }

    pub fn refill_rounds(&self) -> Option<f64> {
        self.fill.map(|f| f.refill_rounds)
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        append_note(&mut self.note, note.into());
    }
}

/// Which earlier occurrence a cycle closed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// Back to the good at the root of the resolution.
    TopLevel,
    Intermediate,
}

/// One node of a resolved recipe tree.
///
/// A base component carries an acquisition detail and no children; an
/// expanded node carries children and its cost is derived from its leaves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CraftingNode {
    pub item: ItemId,
    pub quantity_needed: f64,
    pub is_base_component: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition: Option<AcquisitionDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_per_craft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_crafts: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CraftingNode>,
    pub depth: usize,
    pub max_subtree_depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<CycleKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CraftingNode {
    pub fn base(item: ItemId, quantity: f64, depth: usize, acquisition: AcquisitionDetail) -> Self {
        Self {
            item,
            quantity_needed: quantity,
            is_base_component: true,
            acquisition: Some(acquisition),
            quantity_per_craft: None,
            num_crafts: None,
            children: Vec::new(),
            depth,
            max_subtree_depth: depth,
            cycle: None,
            note: None,
        }
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        append_note(&mut self.note, note.into());
    }

    /// True if any node in this subtree closed a cycle on the root good.
    pub fn cycles_to_top_level(&self) -> bool {
        self.cycle == Some(CycleKind::TopLevel)
            || self.children.iter().any(CraftingNode::cycles_to_top_level)
    }

    /// Every note in the subtree, prefixed with the node's good, depth first.
    pub fn collect_notes(&self, out: &mut Vec<String>) {
        if let Some(note) = &self.note {
            out.push(format!("{}: {}", self.item, note));
        }
        if let Some(note) = self.acquisition.as_ref().and_then(|a| a.note.as_ref()) {
            if self.note.as_deref() != Some(note.as_str()) {
                out.push(format!("{}: {}", self.item, note));
            }
        }
        for child in &self.children {
            child.collect_notes(out);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(CraftingNode::node_count).sum::<usize>()
    }
}

/// Top-level acquisition decision of one perspective.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    BuyOrder {
        #[serde(with = "wire::float")]
        cost: f64,
        #[serde(with = "wire::float")]
        refill_rounds: f64,
        #[serde(with = "wire::float")]
        instant_fill_qty: f64,
    },
    InstaBuy {
        #[serde(with = "wire::float")]
        cost: f64,
    },
    Craft {
        #[serde(with = "wire::float")]
        cost: f64,
    },
    Unobtainable {
        reason: String,
    },
}

impl Decision {
    /// Total cost, infinite when unobtainable.
    pub fn cost(&self) -> f64 {
        match self {
            Decision::BuyOrder { cost, .. } | Decision::InstaBuy { cost } | Decision::Craft { cost } => *cost,
            Decision::Unobtainable { .. } => f64::INFINITY,
        }
    }

    pub fn is_obtainable(&self) -> bool {
        !matches!(self, Decision::Unobtainable { .. })
    }

    pub fn top_level_action(&self) -> &'static str {
        match self {
            Decision::Craft { .. } => "expanded",
            Decision::BuyOrder { .. } | Decision::InstaBuy { .. } => "treated_as_base",
            Decision::Unobtainable { .. } => "unobtainable",
        }
    }

    pub fn final_cost_method(&self) -> &'static str {
        match self {
            Decision::Craft { .. } => "sum_of_base_ingredients",
            Decision::BuyOrder { .. } => "direct_buy_order",
            Decision::InstaBuy { .. } => "direct_insta_buy",
            Decision::Unobtainable { .. } => "none",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::BuyOrder { cost, refill_rounds, .. } => {
                write!(f, "buy order ({}, {} refill rounds)", format_cost(*cost), refill_rounds)
            }
            Decision::InstaBuy { cost } => write!(f, "insta-buy ({})", format_cost(*cost)),
            Decision::Craft { cost } => write!(f, "craft ({})", format_cost(*cost)),
            Decision::Unobtainable { reason } => write!(f, "unobtainable: {}", reason),
        }
    }
}

fn append_note(slot: &mut Option<String>, note: String) {
    match slot {
        Some(existing) if existing.contains(&note) => {}
        Some(existing) => {
            existing.push_str("; ");
            existing.push_str(&note);
        }
        None => *slot = Some(note),
    }
}

/// Human-readable duration: `Infinite`, `N/A` or s/m/h/d units.
pub fn format_duration(secs: f64) -> String {
    if secs.is_nan() {
        return "N/A".to_string();
    }
    if secs == f64::INFINITY {
        return "Infinite".to_string();
    }
    if secs < 0.0 {
        return format!("N/A ({:.2})", secs);
    }
    if secs == 0.0 {
        return "0.0s".to_string();
    }
    if secs < 1.0 {
        return format!("{:.2}s", secs);
    }
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }
    let mins = secs / 60.0;
    if mins < 60.0 {
        return format!("{:.1}m", mins);
    }
    let hours = mins / 60.0;
    if hours < 24.0 {
        return format!("{:.1}h", hours);
    }
    format!("{:.1}d", hours / 24.0)
}

pub fn format_cost(cost: f64) -> String {
    if cost.is_nan() {
        "N/A".to_string()
    } else if cost == f64::INFINITY {
        "Infinite".to_string()
    } else if cost == f64::NEG_INFINITY {
        "-Infinite".to_string()
    } else {
        format!("{:.2}", cost)
    }
}

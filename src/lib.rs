//! Buy-or-craft cost calculator for a virtual commodity exchange.
//!
//! Given a good and a quantity, the engine decides whether to buy it with a
//! standing buy order, insta-buy it, or craft it from sub-components, and
//! estimates how long the acquisition takes.

pub mod calculator;
pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod fill_time;
pub mod import;
pub mod item_id;
pub mod market;
pub mod models;
pub mod optimizer;
pub mod perspective;
pub mod recipe;
pub mod report;
pub mod wire;

pub use calculator::Engine;
pub use error::{ConfigError, Error, Result};
pub use item_id::ItemId;
pub use market::{MarketSnapshot, SnapshotCache, SnapshotSource};
pub use models::{AcquisitionDetail, CraftingNode, Decision, MarketQuote, Method, ProductMetrics};

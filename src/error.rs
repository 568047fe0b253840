//! Error types for the crate.
//!
//! Only input errors and infrastructure failures surface as `Err`. Missing
//! market data, missing recipes and recipe cycles are carried as notes on the
//! nodes and results they affect.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid quantity {quantity} for {item}")]
    InvalidQuantity { item: String, quantity: f64 },

    #[error("invalid price for {item} (sell order: {sell_order_price}, insta-buy: {insta_buy_price})")]
    InvalidPrice {
        item: String,
        sell_order_price: f64,
        insta_buy_price: f64,
    },

    /// The recipe store itself could not be read. Distinct from a missing
    /// recipe, which is an ordinary data-absence case.
    #[error("recipe store unreadable at {path}: {source}")]
    RecipeStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("market response rejected: {0}")]
    Import(String),

    #[error("snapshot unavailable: {0}")]
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;

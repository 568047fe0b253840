//! Market data importers
//!
//! Reads a bazaar API response and the periodic metrics dumps into the
//! database. Metrics dumps are named `metrics_<YYYYMMDDHHMMSS>.json`; a
//! directory import averages the latest few of them.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::error::{Error, Result};
use crate::item_id::ItemId;
use crate::models::{MarketQuote, ProductMetrics};

/// Counts from one import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub quotes: usize,
    pub metrics: usize,
    pub skipped: usize,
    pub files: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} quotes, {} metrics from {} file(s), {} skipped",
            self.quotes, self.metrics, self.files, self.skipped
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BazaarResponse {
    success: bool,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    last_updated: Option<i64>,
    #[serde(default)]
    products: HashMap<String, BazaarProduct>,
}

#[derive(Debug, Deserialize)]
struct BazaarProduct {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    sell_summary: Vec<SummaryEntry>,
    #[serde(default)]
    buy_summary: Vec<SummaryEntry>,
    #[serde(default)]
    quick_status: Option<QuickStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEntry {
    price_per_unit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuickStatus {
    #[serde(default)]
    buy_moving_week: f64,
}

impl BazaarProduct {
    /// Best standing order and best insta-buy are the first summary entries.
    fn quote(&self) -> MarketQuote {
        MarketQuote {
            sell_order_price: self.sell_summary.first().map_or(f64::NAN, |e| e.price_per_unit),
            insta_buy_price: self.buy_summary.first().map_or(f64::NAN, |e| e.price_per_unit),
            moving_week_buy_volume: self.quick_status.as_ref().map_or(0.0, |q| q.buy_moving_week),
        }
    }
}

/// Parse a bazaar response body into normalised quotes.
pub fn parse_bazaar(body: &str) -> Result<Vec<(ItemId, MarketQuote)>> {
    let response: BazaarResponse = serde_json::from_str(body)?;
    if !response.success {
        return Err(Error::Import(response.cause.unwrap_or_else(|| "success=false".to_string())));
    }
    debug!(last_updated = ?response.last_updated, products = response.products.len(), "bazaar response parsed");

    let mut quotes: Vec<_> = response
        .products
        .iter()
        .map(|(key, product)| {
            let raw = product.product_id.as_deref().unwrap_or(key);
            (ItemId::new(raw), product.quote())
        })
        .filter(|(id, _)| !id.is_empty())
        .collect();
    quotes.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(quotes)
}

/// Import a bazaar response file, replacing existing quotes per good.
pub fn import_market(conn: &mut Connection, path: &Path) -> Result<ImportStats> {
    let body = fs::read_to_string(path)?;
    let quotes = parse_bazaar(&body)?;

    let tx = conn.transaction()?;
    for (id, quote) in &quotes {
        db::upsert_quote(&tx, id, quote)?;
    }
    tx.commit()?;

    let stats = ImportStats { quotes: quotes.len(), files: 1, ..Default::default() };
    info!(path = %path.display(), %stats, "market data imported");
    Ok(stats)
}

#[derive(Debug, Deserialize)]
struct MetricsEntry {
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    sell_size: f64,
    #[serde(default)]
    sell_frequency: f64,
    #[serde(default)]
    order_size_average: f64,
    #[serde(default)]
    order_frequency_average: f64,
}

impl MetricsEntry {
    fn metrics(&self) -> ProductMetrics {
        ProductMetrics {
            listing_size: self.sell_size,
            listing_frequency: self.sell_frequency,
            order_size: self.order_size_average,
            order_frequency: self.order_frequency_average,
        }
    }
}

fn read_metrics_file(path: &Path) -> Result<Vec<MetricsEntry>> {
    let body = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

/// Metrics dump files under `dir`, newest first.
pub fn find_metrics_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let name_re = Regex::new(r"^metrics_(\d{14})\.json$")?;
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(cap) = name_re.captures(name) {
            found.push((cap[1].to_string(), entry.path().to_path_buf()));
        }
    }

    // Fixed-width timestamps sort lexically.
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

#[derive(Debug, Default)]
struct Accumulator {
    sum: ProductMetrics,
    files: usize,
}

impl Accumulator {
    fn add(&mut self, m: &ProductMetrics) {
        self.sum.listing_size += m.listing_size;
        self.sum.listing_frequency += m.listing_frequency;
        self.sum.order_size += m.order_size;
        self.sum.order_frequency += m.order_frequency;
        self.files += 1;
    }

    fn mean(&self) -> ProductMetrics {
        let n = self.files.max(1) as f64;
        ProductMetrics {
            listing_size: self.sum.listing_size / n,
            listing_frequency: self.sum.listing_frequency / n,
            order_size: self.sum.order_size / n,
            order_frequency: self.sum.order_frequency / n,
        }
    }
}

#[derive(Debug, Default)]
struct Averager {
    totals: HashMap<ItemId, Accumulator>,
    stats: ImportStats,
}

impl Averager {
    /// Fold one parsed dump in. Later duplicates within a dump overwrite
    /// earlier ones.
    fn add_dump(&mut self, entries: &[MetricsEntry]) {
        self.stats.files += 1;
        let mut in_file: HashMap<ItemId, ProductMetrics> = HashMap::new();
        for entry in entries {
            let id = ItemId::new(&entry.product_id);
            if id.is_empty() {
                self.stats.skipped += 1;
                continue;
            }
            in_file.insert(id, entry.metrics());
        }
        for (id, metrics) in in_file {
            self.totals.entry(id).or_default().add(&metrics);
        }
    }

    fn finish(mut self) -> (Vec<(ItemId, ProductMetrics)>, ImportStats) {
        let mut averaged: Vec<_> = self.totals.into_iter().map(|(id, acc)| (id, acc.mean())).collect();
        averaged.sort_by(|a, b| a.0.cmp(&b.0));
        self.stats.metrics = averaged.len();
        (averaged, self.stats)
    }
}

/// Average per-product metrics over the given files. A product is averaged
/// over the files it appears in; unreadable files are skipped.
pub fn average_metrics(files: &[PathBuf]) -> (Vec<(ItemId, ProductMetrics)>, ImportStats) {
    let mut averager = Averager::default();
    for path in files {
        match read_metrics_file(path) {
            Ok(entries) => averager.add_dump(&entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable metrics file");
                averager.stats.skipped += 1;
            }
        }
    }
    averager.finish()
}

/// Import metrics from one file, or from the latest `window` dumps in a
/// directory.
pub fn import_metrics(conn: &mut Connection, path: &Path, window: usize) -> Result<ImportStats> {
    let (metrics, stats) = if path.is_dir() {
        let mut files = find_metrics_files(path)?;
        files.truncate(window.max(1));
        debug!(dir = %path.display(), files = files.len(), "averaging metrics dumps");
        average_metrics(&files)
    } else {
        // A single named file must parse.
        let entries = read_metrics_file(path)?;
        let mut averager = Averager::default();
        averager.add_dump(&entries);
        averager.finish()
    };

    let tx = conn.transaction()?;
    for (id, m) in &metrics {
        db::upsert_metrics(&tx, id, m)?;
    }
    tx.commit()?;

    info!(path = %path.display(), %stats, "metrics imported");
    Ok(stats)
}

//! Database schema and operations

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::item_id::ItemId;
use crate::market::{MarketSnapshot, SnapshotSource};
use crate::models::{MarketQuote, ProductMetrics};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Top-of-book prices per good
        CREATE TABLE IF NOT EXISTS quotes (
            item_id TEXT PRIMARY KEY,
            sell_order_price REAL,
            insta_buy_price REAL,
            moving_week_buy_volume REAL
        );

        -- Averaged supply/demand flow per good
        CREATE TABLE IF NOT EXISTS metrics (
            item_id TEXT PRIMARY KEY,
            listing_size REAL,
            listing_frequency REAL,
            order_size REAL,
            order_frequency REAL
        );
        "#,
    )?;
    Ok(())
}

/// Open a database file and make sure the schema exists
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Insert or replace a quote
pub fn upsert_quote(conn: &Connection, item: &ItemId, quote: &MarketQuote) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO quotes (item_id, sell_order_price, insta_buy_price, moving_week_buy_volume)
         VALUES (?1, ?2, ?3, ?4)",
        (item.as_str(), quote.sell_order_price, quote.insta_buy_price, quote.moving_week_buy_volume),
    )?;
    Ok(())
}

/// Insert or replace the metrics of a good
pub fn upsert_metrics(conn: &Connection, item: &ItemId, metrics: &ProductMetrics) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metrics (item_id, listing_size, listing_frequency, order_size, order_frequency)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            item.as_str(),
            metrics.listing_size,
            metrics.listing_frequency,
            metrics.order_size,
            metrics.order_frequency,
        ),
    )?;
    Ok(())
}

/// Clear all market data (for re-import)
pub fn clear_market_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM metrics;
        DELETE FROM quotes;
        "#,
    )?;
    Ok(())
}

// SQLite stores NaN as NULL; read it back as NaN so the quote stays unusable.
fn real(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

pub fn get_quote(conn: &Connection, item: &ItemId) -> Result<Option<MarketQuote>> {
    let quote = conn
        .query_row(
            "SELECT sell_order_price, insta_buy_price, moving_week_buy_volume FROM quotes WHERE item_id = ?1",
            [item.as_str()],
            |row| {
                Ok(MarketQuote {
                    sell_order_price: real(row, 0)?,
                    insta_buy_price: real(row, 1)?,
                    moving_week_buy_volume: real(row, 2)?,
                })
            },
        )
        .optional()?;
    Ok(quote)
}

/// Every quoted good, sorted
pub fn list_quoted_items(conn: &Connection) -> Result<Vec<ItemId>> {
    let mut stmt = conn.prepare("SELECT item_id FROM quotes ORDER BY item_id")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids.iter().map(|id| ItemId::new(id)).collect())
}

/// Read every quote and metrics row into one snapshot
pub fn load_snapshot(conn: &Connection) -> Result<MarketSnapshot> {
    let mut snapshot = MarketSnapshot::new();

    let mut stmt =
        conn.prepare("SELECT item_id, sell_order_price, insta_buy_price, moving_week_buy_volume FROM quotes")?;
    let quotes = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            MarketQuote {
                sell_order_price: real(row, 1)?,
                insta_buy_price: real(row, 2)?,
                moving_week_buy_volume: real(row, 3)?,
            },
        ))
    })?;
    for quote in quotes {
        let (id, quote) = quote?;
        snapshot.insert_quote(ItemId::new(&id), quote);
    }

    let mut stmt = conn.prepare(
        "SELECT item_id, listing_size, listing_frequency, order_size, order_frequency FROM metrics",
    )?;
    let metrics = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            ProductMetrics {
                listing_size: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                listing_frequency: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                order_size: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                order_frequency: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
            },
        ))
    })?;
    for entry in metrics {
        let (id, metrics) = entry?;
        snapshot.insert_metrics(ItemId::new(&id), metrics);
    }

    Ok(snapshot)
}

/// Snapshot source backed by a SQLite file. Each load opens its own
/// connection so the refresher thread never shares one with a caller.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for SqliteSource {
    fn load(&self) -> Result<MarketSnapshot> {
        let conn = open(&self.path)?;
        load_snapshot(&conn)
    }
}

//! Database, importer and snapshot cache tests.

mod support;

use std::fs;
use std::sync::Arc;

use craftcost::db::{self, SqliteSource};
use craftcost::error::Error;
use craftcost::import::{find_metrics_files, import_market, import_metrics};
use craftcost::market::SnapshotCache;

use support::{assert_close, id};

const BAZAAR: &str = r#"{
    "success": true,
    "lastUpdated": 1700000000000,
    "products": {
        "WHEAT": {
            "product_id": "WHEAT",
            "sell_summary": [{"amount": 100, "pricePerUnit": 5.5, "orders": 3}, {"amount": 50, "pricePerUnit": 5.4, "orders": 1}],
            "buy_summary": [{"amount": 80, "pricePerUnit": 6.0, "orders": 2}],
            "quick_status": {"productId": "WHEAT", "buyMovingWeek": 5000000, "sellMovingWeek": 4000000}
        },
        "LOG": {
            "product_id": "LOG",
            "sell_summary": [{"amount": 10, "pricePerUnit": 3.0, "orders": 1}],
            "buy_summary": [{"amount": 10, "pricePerUnit": 3.5, "orders": 1}],
            "quick_status": {"buyMovingWeek": 700000}
        }
    }
}"#;

fn metrics_file(entries: &[(&str, f64)]) -> String {
    let rows: Vec<String> = entries
        .iter()
        .map(|(id, size)| {
            format!(
                r#"{{"product_id": "{id}", "sell_size": {size}, "sell_frequency": 2.0, "order_size_average": 1.0, "order_frequency_average": 4.0}}"#
            )
        })
        .collect();
    format!("[{}]", rows.join(","))
}

#[test]
fn market_import_normalizes_ids() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bazaar.json");
    fs::write(&file, BAZAAR).unwrap();
    let mut conn = db::open(&dir.path().join("market.db")).unwrap();

    let stats = import_market(&mut conn, &file).unwrap();
    assert_eq!(stats.quotes, 2);

    let oak = db::get_quote(&conn, &id("OAK_LOG")).unwrap().unwrap();
    assert_eq!(oak.sell_order_price, 3.0);
    let wheat = db::get_quote(&conn, &id("WHEAT")).unwrap().unwrap();
    assert_eq!(wheat.sell_order_price, 5.5);
    assert_eq!(wheat.insta_buy_price, 6.0);
    assert_eq!(wheat.moving_week_buy_volume, 5_000_000.0);
    assert_eq!(db::list_quoted_items(&conn).unwrap(), vec![id("OAK_LOG"), id("WHEAT")]);
}

#[test]
fn failed_response_leaves_database_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("bazaar.json");
    fs::write(&file, r#"{"success": false}"#).unwrap();
    let mut conn = db::open(&dir.path().join("market.db")).unwrap();

    assert!(matches!(import_market(&mut conn, &file), Err(Error::Import(_))));
    assert!(db::load_snapshot(&conn).unwrap().is_empty());
}

#[test]
fn metrics_directory_averages_latest_window() {
    let dir = tempfile::tempdir().unwrap();
    let dumps = dir.path().join("dumps");
    fs::create_dir_all(dumps.join("nested")).unwrap();
    fs::write(dumps.join("metrics_20240101000000.json"), metrics_file(&[("WHEAT", 1000.0)])).unwrap();
    fs::write(dumps.join("metrics_20240102000000.json"), metrics_file(&[("WHEAT", 10.0)])).unwrap();
    fs::write(
        dumps.join("nested").join("metrics_20240103000000.json"),
        metrics_file(&[("WHEAT", 20.0), ("LOG", 7.0), ("", 1.0)]),
    )
    .unwrap();
    fs::write(dumps.join("metrics_20240104000000.json"), "not json").unwrap();
    fs::write(dumps.join("notes.json"), "[]").unwrap();

    let found = find_metrics_files(&dumps).unwrap();
    assert_eq!(found.len(), 4);
    assert!(found[0].ends_with("metrics_20240104000000.json"));

    let mut conn = db::open(&dir.path().join("market.db")).unwrap();
    let stats = import_metrics(&mut conn, &dumps, 3).unwrap();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.metrics, 2);
    assert_eq!(stats.skipped, 2);

    let snapshot = db::load_snapshot(&conn).unwrap();
    let wheat = snapshot.metrics(&id("WHEAT")).unwrap();
    assert_close(wheat.listing_size, 15.0);
    assert_close(wheat.order_frequency, 4.0);
    // LOG appears in one file only and is averaged over that file.
    assert_close(snapshot.metrics(&id("OAK_LOG")).unwrap().listing_size, 7.0);
}

#[test]
fn single_metrics_file_is_imported_as_is() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("metrics.json");
    fs::write(&file, metrics_file(&[("WHEAT", 3.0), ("", 1.0), ("WHEAT", 9.0)])).unwrap();
    let mut conn = db::open(&dir.path().join("market.db")).unwrap();

    let stats = import_metrics(&mut conn, &file, 5).unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.metrics, 1);
    assert_eq!(stats.skipped, 1);

    let snapshot = db::load_snapshot(&conn).unwrap();
    assert_close(snapshot.metrics(&id("WHEAT")).unwrap().listing_size, 9.0);
}

#[test]
fn unreadable_metrics_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("metrics.json");
    fs::write(&file, "{").unwrap();
    let mut conn = db::open(&dir.path().join("market.db")).unwrap();

    assert!(matches!(import_metrics(&mut conn, &file, 1), Err(Error::Json(_))));
}

#[test]
fn cache_serves_sqlite_snapshot_and_sees_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("market.db");
    let file = dir.path().join("bazaar.json");
    fs::write(&file, BAZAAR).unwrap();
    let mut conn = db::open(&path).unwrap();

    let cache = Arc::new(SnapshotCache::new(SqliteSource::new(path.clone())));
    assert_eq!(cache.get().unwrap().quote_count(), 0);

    import_market(&mut conn, &file).unwrap();
    assert_eq!(cache.get().unwrap().quote_count(), 0);
    assert_eq!(cache.refresh().unwrap().quote_count(), 2);
    assert!(cache.get().unwrap().quote(&id("WHEAT")).is_some());
}

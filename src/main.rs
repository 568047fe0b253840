//! craftcost CLI
//!
//! Buy-or-craft cost calculator for a virtual commodity exchange.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use craftcost::calculator::{self, Engine};
use craftcost::config::{Config, DEFAULT_CONFIG_FILE};
use craftcost::cost;
use craftcost::db::{self, SqliteSource};
use craftcost::import;
use craftcost::item_id::ItemId;
use craftcost::market::{MarketSnapshot, SnapshotCache, spawn_refresher};
use craftcost::models::{MarketQuote, ProductMetrics, format_cost, format_duration};
use craftcost::optimizer::{self, OptimizationResult};
use craftcost::perspective;
use craftcost::recipe::{RecipeDir, RecipeFile, RecipeGrid, RecipeSource};
use craftcost::report;

#[derive(Parser)]
#[command(name = "craftcost")]
#[command(about = "Buy-or-craft cost calculator for a virtual commodity exchange")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to the SQLite database (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Recipe directory (overrides config)
    #[arg(short, long)]
    recipes: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load sample market data and recipes for testing
    LoadSample,

    /// Import a bazaar API response
    ImportMarket {
        /// Path to the saved response JSON
        file: PathBuf,

        /// Clear existing market data before import
        #[arg(long)]
        clear: bool,
    },

    /// Import metrics from a dump file or a directory of dumps
    ImportMetrics {
        /// Metrics file, or directory of metrics_<timestamp>.json files
        path: PathBuf,

        /// Number of newest dumps to average (overrides config)
        #[arg(short, long)]
        window: Option<usize>,
    },

    /// Show the market quote and direct costs for a good
    Quote {
        item: String,

        #[arg(short, long, default_value = "1")]
        qty: f64,
    },

    /// Fill report: base ingredients to order, fill times and profit
    Fill {
        item: String,

        qty: f64,

        #[arg(long)]
        json: bool,
    },

    /// Resolve a good under both perspectives
    Expand {
        item: String,

        qty: f64,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Show the resolved recipe tree
        #[arg(short, long)]
        tree: bool,
    },

    /// Find the most profitable quantity per good within a time budget
    Optimize {
        /// Goods to optimize (default: every listed good)
        items: Vec<String>,

        /// Time budget in seconds (overrides config)
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Upper search bound (overrides config)
        #[arg(short, long)]
        max_qty: Option<f64>,

        /// Only goods that have a recipe
        #[arg(long)]
        craftable: bool,

        #[arg(long)]
        json: bool,
    },

    /// List every good with a recipe
    ListRecipes,

    /// Refresh market data in the background and re-rank periodically
    Watch {
        /// Seconds between rankings (overrides config refresh interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many rankings (0 runs until interrupted)
        #[arg(long, default_value = "0")]
        rounds: u64,

        /// Rows to print per ranking
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(recipes) = cli.recipes {
        config.recipe_dir = recipes;
    }
    config.logging.init();

    let mut conn = db::open(&config.database)
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;
    let recipes = RecipeDir::new(config.recipe_dir.clone());

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", config.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn, &config.recipe_dir)?;
            println!("Sample data loaded successfully!");
        }

        Commands::ImportMarket { file, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_market_data(&conn)?;
            }
            let stats = import::import_market(&mut conn, &file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("{}", stats);
        }

        Commands::ImportMetrics { path, window } => {
            let window = window.unwrap_or(config.import.metrics_window);
            let stats = import::import_metrics(&mut conn, &path, window)
                .with_context(|| format!("Failed to import metrics from {}", path.display()))?;
            println!("{}", stats);
        }

        Commands::Quote { item, qty } => {
            let snapshot = db::load_snapshot(&conn)?;
            let id = ItemId::new(&item);
            print_quote(&snapshot, &id, qty)?;
        }

        Commands::Fill { item, qty, json } => {
            let snapshot = db::load_snapshot(&conn)?;
            let engine = Engine::new(&snapshot, &recipes);
            let fill = report::fill_report(&engine, &ItemId::new(&item), qty)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&fill)?);
            } else {
                println!("{}", fill);
            }
        }

        Commands::Expand { item, qty, json, tree } => {
            let snapshot = db::load_snapshot(&conn)?;
            let engine = Engine::new(&snapshot, &recipes);
            let id = ItemId::new(&item);
            let resolution = perspective::resolve_dual(&engine, &id, qty)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
                return Ok(());
            }
            if tree {
                let craft_tree = engine.craft_tree(&id, qty)?;
                println!("Recipe tree:\n");
                println!("{}", calculator::format_tree(&craft_tree, 0));
                println!("{}", calculator::summarize_tree(&snapshot, &craft_tree)?);
            }
            println!("{}", resolution);
        }

        Commands::Optimize { items, time_limit, max_qty, craftable, json } => {
            let snapshot = db::load_snapshot(&conn)?;
            let engine = Engine::new(&snapshot, &recipes);
            let mut settings = config.optimizer.settings();
            if let Some(limit) = time_limit {
                if !(limit.is_finite() && limit > 0.0) {
                    bail!("--time-limit must be positive, got {}", limit);
                }
                settings.time_budget_secs = limit;
            }
            if let Some(max) = max_qty {
                settings.max_search_qty = max;
            }

            let targets = select_items(&snapshot, &recipes, &items, craftable)?;
            let results = optimizer::optimize_all(&engine, &targets, &settings);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_rankings(&results, results.len());
            }
        }

        Commands::ListRecipes => {
            let items = recipes.list()?;
            if items.is_empty() {
                println!("No recipes in {}. Run 'load-sample' first.", config.recipe_dir.display());
            } else {
                println!("Recipes:");
                for item in items {
                    println!("  {}", item);
                }
            }
        }

        Commands::Watch { interval, rounds, top } => {
            drop(conn);
            let interval = Duration::from_secs(interval.unwrap_or(config.refresh.interval_secs).max(1));
            let settings = config.optimizer.settings();
            let cache = Arc::new(SnapshotCache::new(SqliteSource::new(config.database.clone())));
            let refresher = spawn_refresher(Arc::clone(&cache), interval);

            let mut round = 0;
            let outcome = loop {
                let snapshot = match cache.get() {
                    Ok(snapshot) => snapshot,
                    Err(e) => break Err(e),
                };
                let engine = Engine::new(&snapshot, &recipes);
                let results = optimizer::optimize_all(&engine, &snapshot.listed_items(), &settings);
                println!("--- ranking {} ---", round + 1);
                print_rankings(&results, top);

                round += 1;
                if rounds != 0 && round >= rounds {
                    break Ok(());
                }
                std::thread::sleep(interval);
                recipes.clear();
            };
            refresher.stop();
            outcome?;
        }
    }

    Ok(())
}

fn select_items(
    snapshot: &MarketSnapshot,
    recipes: &dyn RecipeSource,
    requested: &[String],
    craftable: bool,
) -> Result<Vec<ItemId>> {
    let mut items: Vec<ItemId> = if requested.is_empty() {
        snapshot.listed_items()
    } else {
        requested.iter().map(|s| ItemId::new(s)).collect()
    };
    if craftable {
        let with_recipe = recipes.list()?;
        items.retain(|item| with_recipe.binary_search(item).is_ok());
    }
    Ok(items)
}

fn print_quote(snapshot: &MarketSnapshot, item: &ItemId, qty: f64) -> Result<()> {
    let Some(listing) = snapshot.listing(item) else {
        println!("'{}' is not listed on the market", item);
        return Ok(());
    };
    println!("{}", item);
    println!("  Sell order:  {}", format_cost(listing.sell_order_price));
    println!("  Insta-buy:   {}", format_cost(listing.insta_buy_price));
    println!("  Weekly vol:  {:.0}", listing.moving_week_buy_volume);
    match snapshot.metrics(item) {
        Some(m) => println!(
            "  Metrics:     listing {:.2} x {:.2}/cycle, orders {:.2} x {:.2}/cycle",
            m.listing_size, m.listing_frequency, m.order_size, m.order_frequency
        ),
        None => println!("  Metrics:     missing"),
    }

    let detail = cost::evaluate(snapshot, item, qty)?;
    if let Some(costs) = cost::direct_costs(snapshot, item, qty)? {
        println!();
        println!("  {:.0} units:", qty);
        println!("    buy order  {}", format_cost(costs.buy_order));
        println!("    insta-buy  {}", format_cost(costs.insta_buy));
        println!("    best       {} ({})", detail.method, format_cost(detail.best_cost));
    }
    if let Some(note) = &detail.note {
        println!("  Note: {}", note);
    }
    Ok(())
}

fn print_rankings(results: &[OptimizationResult], top: usize) {
    if results.is_empty() {
        println!("Nothing to optimize. Run 'import-market' or 'load-sample' first.");
        return;
    }
    println!(
        "{:<32} {:>10} {:>14} {:>14} {:>10}  {}",
        "Item", "Qty", "Cost", "Profit", "Cycle", "Bottleneck"
    );
    println!("{}", "-".repeat(96));
    for r in results.iter().take(top) {
        if !r.calculation_possible {
            println!(
                "{:<32} {:>10} {}",
                r.item_name.as_str(),
                "-",
                r.error_message.as_deref().unwrap_or("infeasible")
            );
            continue;
        }
        println!(
            "{:<32} {:>10} {:>14} {:>14} {:>10}  {}",
            r.item_name.as_str(),
            r.max_feasible_quantity,
            format_cost(r.cost_at_optimal_qty),
            format_cost(r.max_profit),
            format_duration(r.total_cycle_time_at_optimal_qty),
            r.bottleneck_ingredient.as_ref().map_or("-", |b| b.as_str())
        );
    }
}

/// Load a small sample market and its recipes for testing without live data
fn load_sample_data(conn: &Connection, recipe_dir: &Path) -> Result<()> {
    db::clear_market_data(conn)?;

    // (id, sell order, insta-buy, weekly volume, listing size, listing freq, order size, order freq)
    let market: [(&str, f64, f64, f64, f64, f64, f64, f64); 8] = [
        ("COAL", 2.0, 2.5, 8_000_000.0, 640.0, 40.0, 900.0, 35.0),
        ("ENCHANTED_COAL", 330.0, 360.0, 900_000.0, 12.0, 30.0, 20.0, 25.0),
        ("ENCHANTED_COAL_BLOCK", 52_000.0, 56_000.0, 20_000.0, 2.0, 4.0, 3.0, 5.0),
        ("WHEAT", 5.5, 6.0, 5_000_000.0, 400.0, 30.0, 350.0, 30.0),
        ("HAY_BLOCK", 52.0, 58.0, 400_000.0, 40.0, 20.0, 30.0, 18.0),
        ("ENCHANTED_BREAD", 350.0, 380.0, 60_000.0, 6.0, 8.0, 5.0, 6.0),
        ("SUGAR_CANE", 4.0, 4.4, 6_000_000.0, 500.0, 35.0, 600.0, 30.0),
        ("ENCHANTED_SUGAR", 620.0, 700.0, 300_000.0, 10.0, 12.0, 14.0, 15.0),
    ];
    for (id, sell, insta, volume, ls, lf, os, of) in market {
        let id = ItemId::new(id);
        db::upsert_quote(
            conn,
            &id,
            &MarketQuote { sell_order_price: sell, insta_buy_price: insta, moving_week_buy_volume: volume },
        )?;
        db::upsert_metrics(
            conn,
            &id,
            &ProductMetrics { listing_size: ls, listing_frequency: lf, order_size: os, order_frequency: of },
        )?;
    }

    fs::create_dir_all(recipe_dir)
        .with_context(|| format!("Failed to create {}", recipe_dir.display()))?;

    let plus = |ingredient: &str| -> Vec<(&'static str, String)> {
        ["A2", "B1", "B2", "B3", "C2"].iter().map(|slot| (*slot, ingredient.to_string())).collect()
    };
    let recipes: Vec<(&str, Vec<(&str, String)>)> = vec![
        ("ENCHANTED_COAL", plus("COAL:32")),
        ("ENCHANTED_COAL_BLOCK", plus("ENCHANTED_COAL:32")),
        ("ENCHANTED_SUGAR", plus("SUGAR_CANE:32")),
        (
            "HAY_BLOCK",
            ["A1", "A2", "A3", "B1", "B2", "B3", "C1", "C2", "C3"]
                .iter()
                .map(|slot| (*slot, "WHEAT".to_string()))
                .collect(),
        ),
        (
            "ENCHANTED_BREAD",
            ["A1", "A2", "A3", "B1", "B2", "B3"].iter().map(|slot| (*slot, "WHEAT:10".to_string())).collect(),
        ),
    ];
    for (id, slots) in recipes {
        let slots: Vec<(&str, &str)> = slots.iter().map(|(slot, cell)| (*slot, cell.as_str())).collect();
        let file = RecipeFile {
            itemid: id.to_string(),
            recipe: Some(RecipeGrid::from_slots(&slots, Some(1))),
            ..RecipeFile::default()
        };
        let path = recipe_dir.join(format!("{}.json", id));
        fs::write(&path, serde_json::to_string_pretty(&file)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!("  {} quotes, {} recipes", market.len(), 5);
    Ok(())
}

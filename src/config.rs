//! Configuration loading and validation.
//!
//! Configuration is an optional TOML file. Every section has defaults, so a
//! missing file or a missing section falls back to them.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{ConfigError, Result};
use crate::optimizer::{MAX_ITERATIONS, OptimizerSettings};

pub const DEFAULT_CONFIG_FILE: &str = "craftcost.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding quotes and metrics.
    pub database: PathBuf,
    /// Directory with one `<ITEM_ID>.json` recipe per good.
    pub recipe_dir: PathBuf,
    pub logging: LoggingConfig,
    pub optimizer: OptimizerConfig,
    pub import: ImportConfig,
    pub refresh: RefreshConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("market.db"),
            recipe_dir: PathBuf::from("dependencies/items"),
            logging: LoggingConfig::default(),
            optimizer: OptimizerConfig::default(),
            import: ImportConfig::default(),
            refresh: RefreshConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. `RUST_LOG` takes precedence over
    /// the configured level.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
            }
            _ => {
                fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub time_budget_secs: f64,
    pub max_search_qty: f64,
    pub max_iterations: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let settings = OptimizerSettings::default();
        Self {
            time_budget_secs: settings.time_budget_secs,
            max_search_qty: settings.max_search_qty,
            max_iterations: settings.max_iterations,
        }
    }
}

impl OptimizerConfig {
    pub fn settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            time_budget_secs: self.time_budget_secs,
            max_search_qty: self.max_search_qty,
            max_iterations: self.max_iterations,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// How many of the newest metrics dumps a directory import averages.
    pub metrics_window: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { metrics_window: 12 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 120 }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::ReadFile { path: path.to_path_buf(), source }.into());
            }
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let opt = &self.optimizer;
        if !(opt.time_budget_secs.is_finite() && opt.time_budget_secs > 0.0) {
            return Err(invalid("optimizer.time_budget_secs", format!("must be positive, got {}", opt.time_budget_secs)));
        }
        if opt.max_search_qty.is_nan() || opt.max_search_qty < 1.0 {
            return Err(invalid("optimizer.max_search_qty", format!("must be at least 1, got {}", opt.max_search_qty)));
        }
        if !(1..=MAX_ITERATIONS).contains(&opt.max_iterations) {
            return Err(invalid(
                "optimizer.max_iterations",
                format!("must be between 1 and {}, got {}", MAX_ITERATIONS, opt.max_iterations),
            ));
        }
        if self.import.metrics_window == 0 {
            return Err(invalid("import.metrics_window", "must be at least 1".to_string()));
        }
        if self.refresh.interval_secs == 0 {
            return Err(invalid("refresh.interval_secs", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> crate::error::Error {
    ConfigError::InvalidValue { field, reason }.into()
}

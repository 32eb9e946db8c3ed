//! Engine configuration loaded from a TOML file.
//!
//! Every field has a default that reproduces the established behavior, so an empty
//! file (or no file at all) yields `EngineConfig::default()`. The two budget
//! thresholds are deliberately separate: `budget_status` marks a budget as a warning
//! from 90% while the alert evaluator reports "near limit" above 80%.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// How `transfer` transactions affect balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPolicy {
    /// Accepted, but neither leg's balance changes.
    #[default]
    NoEffect,
    /// Refused with `InvalidInput` until two-leg semantics exist.
    Reject,
}

/// Which period `budget_status` measures a budget against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriodSource {
    /// Current calendar month or year derived from today and the budget's period type.
    #[default]
    Recomputed,
    /// The budget's own `start_date`/`end_date`.
    Stored,
}

/// Behavior switches for the ledger and aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transfer handling in the ledger store
    pub transfer_policy: TransferPolicy,
    /// Active period used by `budget_status`
    pub budget_period_source: BudgetPeriodSource,
    /// `budget_status` reports `warning` at or above this percentage
    pub budget_warning_percent: Decimal,
    /// Alert evaluator reports "near limit" when spent exceeds this share of the limit
    pub alert_near_limit_ratio: Decimal,
    /// Bills due within this many days raise an alert
    pub bill_due_window_days: i64,
    /// Month-over-month expense change (percent) that produces a spending insight
    pub insight_change_percent: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transfer_policy: TransferPolicy::default(),
            budget_period_source: BudgetPeriodSource::default(),
            budget_warning_percent: Decimal::from(90),
            alert_near_limit_ratio: Decimal::new(8, 1),
            bill_due_window_days: 7,
            insight_change_percent: Decimal::from(20),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse engine config: {e}"),
        })
    }
}

/// Loads engine configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has an unknown value (e.g. `transfer_policy = "two_leg"`)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path_ref = path.as_ref();
    debug!("Loading engine configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    EngineConfig::from_toml_str(&contents)
}

/// Loads configuration from `./ledger.toml`, falling back to defaults when the file is absent.
pub fn load_default_config() -> Result<EngineConfig> {
    let path = Path::new("ledger.toml");
    if path.exists() {
        load_config(path)
    } else {
        Ok(EngineConfig::default())
    }
}

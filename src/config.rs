//! Configuration management
//!
//! Handles loading and validating the JSON session configuration. The
//! `strategy` section is kept as raw JSON and parsed by the strategy factory
//! selected through its `name` key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::pipeline::MIN_BARS;
use crate::strategies::ut_trend;

/// Environment variable overriding the configured symbol
pub const SYMBOL_ENV: &str = "TSE_SYMBOL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instrument traded by the session
    pub symbol: String,
    /// Strategy parameters; `name` selects the strategy
    #[serde(default = "default_strategy")]
    pub strategy: serde_json::Value,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

fn default_strategy() -> serde_json::Value {
    serde_json::json!({ "name": ut_trend::NAME })
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        if let Ok(symbol) = std::env::var(SYMBOL_ENV) {
            if !symbol.trim().is_empty() {
                config.symbol = symbol.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Strategy name from the strategy section
    pub fn strategy_name(&self) -> Result<&str, ConfigError> {
        self.strategy
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConfigError::UnknownStrategy("<missing name>".to_string()))
    }

    /// Validate the session-level sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy_name()?;

        if self.session.max_history < MIN_BARS {
            return Err(ConfigError::HistoryTooShort {
                max_history: self.session.max_history,
                min: MIN_BARS,
            });
        }
        if !(self.execution.tick_size > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "execution.tick_size",
                value: self.execution.tick_size,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            symbol: "SPY".to_string(),
            strategy: default_strategy(),
            session: SessionConfig::default(),
            execution: ExecutionConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bars kept in the rolling buffer (oldest evicted first)
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_max_history() -> usize { 500 }

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_history: default_max_history(),
        }
    }
}

/// Paper execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    /// Ticks of adverse slippage applied to every fill
    #[serde(default = "default_slippage_ticks")]
    pub slippage_ticks: u32,
}

fn default_tick_size() -> f64 { 0.01 }
fn default_slippage_ticks() -> u32 { 1 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            tick_size: default_tick_size(),
            slippage_ticks: default_slippage_ticks(),
        }
    }
}

/// CSV trade journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_journal_dir")]
    pub dir: String,
    #[serde(default = "default_journal_prefix")]
    pub prefix: String,
}

fn default_true() -> bool { true }
fn default_journal_dir() -> String { "logs".to_string() }
fn default_journal_prefix() -> String { "session".to_string() }

impl Default for JournalConfig {
    fn default() -> Self {
        JournalConfig {
            enabled: default_true(),
            dir: default_journal_dir(),
            prefix: default_journal_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "symbol": "QQQ" }"#).unwrap();
        assert_eq!(config.symbol, "QQQ");
        assert_eq!(config.strategy_name().unwrap(), "ut_trend");
        assert_eq!(config.session.max_history, 500);
        assert_eq!(config.execution.tick_size, 0.01);
        assert_eq!(config.execution.slippage_ticks, 1);
        assert!(config.journal.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_history_rejected() {
        let mut config = Config::default();
        config.session.max_history = 50;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HistoryTooShort { max_history: 50, .. })
        ));
    }

    #[test]
    fn test_missing_strategy_name_rejected() {
        let mut config = Config::default();
        config.strategy = serde_json::json!({ "min_adx": 25.0 });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_from_file_parses_strategy_section() {
        let dir = std::env::temp_dir().join(format!("tse_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        fs::write(
            &path,
            r#"{
                "symbol": "AAPL",
                "strategy": { "name": "ut_trend", "shares_per_trade": 25 },
                "execution": { "tick_size": 0.05 }
            }"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.execution.tick_size, 0.05);
        assert_eq!(config.execution.slippage_ticks, 1);
        let params = ut_trend::params_from_config(&config).unwrap();
        assert_eq!(params.shares_per_trade, 25.0);

        fs::remove_dir_all(&dir).unwrap();
    }
}

//! UT Trend Strategy
//!
//! Long-only trend entries gated by a volatility/trend regime filter and
//! momentum confirmations, with a staged exit.
//!
//! ## Entry Logic (Long)
//! 1. Optional cooldown of `cooldown_bars` after a losing close
//! 2. Regime: ADX, ATR% and Bollinger width above their minimums
//! 3. Optional UT filter: UT Bot direction must be long
//! 4. Confirmations: RSI above threshold, MACD histogram above tolerance,
//!    optionally volume above `volume_mult` x its average
//! 5. Any trigger on the last two bars:
//!    - pullback: close reclaims the pullback EMA, optionally after a dip of
//!      `pullback_min_atr` and with the VWAP reclaim filter
//!    - breakout: close above the prior Donchian high
//!    - UT cross: close crosses above the UT Bot trailing stop
//!
//! ## Exit Logic
//! 1. Stop loss: entry - stop_atr_multiple x ATR
//! 2. Partial take profit at entry + target_atr_multiple x ATR, stop to breakeven.
//!    When the partial rounds down to zero shares the target is only recorded.
//! 3. ATR trailing stop on the runner
//! 4. Time stop after max_bars_in_trade

mod config;
mod strategy;

pub use config::StrategyParams;
pub use strategy::UtTrendStrategy;

use crate::{Config, Strategy};
use anyhow::{Context, Result};

/// Registry name
pub const NAME: &str = "ut_trend";

/// Parse and validate the strategy parameters from config
pub fn params_from_config(config: &Config) -> Result<StrategyParams> {
    let params: StrategyParams = serde_json::from_value(config.strategy.clone())
        .context("Failed to parse ut_trend strategy config")?;
    params.validate()?;
    Ok(params)
}

/// Create strategy from config (called by registry)
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    Ok(Box::new(UtTrendStrategy::new(params_from_config(config)?)))
}

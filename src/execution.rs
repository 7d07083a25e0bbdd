//! Order execution
//!
//! The session only emits intents; an [`Executor`] turns them into fills that
//! are fed back to the position manager.

use tracing::debug;

use crate::config::ExecutionConfig;
use crate::types::{ExecutedSignal, SignalType, TradingSignal};

/// Turns signals into fills
pub trait Executor {
    /// `None` when nothing was filled
    fn execute(&mut self, signal: &TradingSignal) -> Option<ExecutedSignal>;
}

/// Immediate simulated fills with fixed tick slippage against the trader
#[derive(Debug, Clone)]
pub struct PaperExecutor {
    tick_size: f64,
    slippage_ticks: u32,
}

impl PaperExecutor {
    pub fn new(tick_size: f64, slippage_ticks: u32) -> Self {
        Self {
            tick_size,
            slippage_ticks,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.tick_size, config.slippage_ticks)
    }

    /// Snap to the tick grid
    fn round_to_tick(&self, price: f64) -> f64 {
        if self.tick_size > 0.0 {
            (price / self.tick_size).round() * self.tick_size
        } else {
            price
        }
    }

    fn fill_price(&self, signal: &TradingSignal) -> f64 {
        let slippage = self.tick_size * f64::from(self.slippage_ticks);
        let base = self.round_to_tick(signal.price);
        match signal.signal_type {
            SignalType::Buy => base + slippage,
            // Never fill a sell at or below zero
            _ => (base - slippage).max(self.tick_size),
        }
    }
}

impl Executor for PaperExecutor {
    fn execute(&mut self, signal: &TradingSignal) -> Option<ExecutedSignal> {
        if !signal.is_actionable() || !(signal.quantity > 0.0) {
            return None;
        }

        let fill_price = self.fill_price(signal);
        debug!(
            signal = %signal.signal_type,
            reference = signal.price,
            fill_price,
            quantity = signal.quantity,
            "Paper fill"
        );

        Some(ExecutedSignal {
            signal: signal.clone(),
            fill_price,
            fill_quantity: signal.quantity,
            timestamp: signal.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_buy_slips_up() {
        let mut exec = PaperExecutor::new(0.01, 2);
        let signal = TradingSignal::buy(ts(), 100.0, 10.0, "Entry: Breakout", 0.7, 98.0, 101.0);
        let fill = exec.execute(&signal).unwrap();
        assert_relative_eq!(fill.fill_price, 100.02, epsilon = 1e-9);
        assert_eq!(fill.fill_quantity, 10.0);
    }

    #[test]
    fn test_sell_slips_down() {
        let mut exec = PaperExecutor::new(0.05, 1);
        let signal = TradingSignal::exit(SignalType::Sell, ts(), 50.02, 10.0, "Stop Loss");
        let fill = exec.execute(&signal).unwrap();
        // 50.02 snaps to 50.00, then one tick down
        assert_relative_eq!(fill.fill_price, 49.95, epsilon = 1e-9);
    }

    #[test]
    fn test_none_signal_not_filled() {
        let mut exec = PaperExecutor::from_config(&ExecutionConfig::default());
        let signal = TradingSignal::none(ts(), 100.0, "Holding");
        assert!(exec.execute(&signal).is_none());
    }
}

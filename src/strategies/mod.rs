//! Trading Strategies Module
//!
//! Strategy trait and the name-based factory used by the session driver.

pub mod ut_trend;

use crate::pipeline::IndicatorSnapshot;
use crate::position::PositionManager;
use crate::{Config, TradingSignal};
use anyhow::Result;
use chrono::{DateTime, Utc};

use ut_trend::StrategyParams;

// =============================================================================
// Strategy Trait
// =============================================================================

/// Signal generator contract.
///
/// Implementations are externally stateless: the signal depends only on the
/// snapshot history, the current price and the position held by
/// [`PositionManager`]. A strategy reads the position through the manager and
/// requests the refresh and stop-ratchet side effects through its methods.
pub trait Strategy: Send + Sync {
    /// Strategy identifier (must match the config's strategy name)
    fn name(&self) -> &'static str;

    /// Parameters driving both the indicator pipeline and the signal rules
    fn params(&self) -> &StrategyParams;

    /// Produce at most one signal for the latest bar
    fn generate_signal(
        &self,
        snapshots: &[IndicatorSnapshot],
        price: f64,
        timestamp: DateTime<Utc>,
        positions: &mut PositionManager,
    ) -> TradingSignal;

    /// Initialize strategy (called once before the first bar)
    fn init(&mut self) {}
}

// =============================================================================
// Strategy Factory
// =============================================================================

/// Factory function type for creating strategies from config
pub type StrategyFactory = fn(&Config) -> Result<Box<dyn Strategy>>;

const REGISTRY: &[(&str, StrategyFactory)] = &[(ut_trend::NAME, ut_trend::create)];

/// Create a strategy from configuration
pub fn create_strategy(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_name = config.strategy_name()?;
    let factory = REGISTRY
        .iter()
        .find(|(name, _)| *name == strategy_name)
        .map(|(_, factory)| factory)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown strategy: '{}'. Available: {}",
                strategy_name,
                available_strategies().join(", ")
            )
        })?;

    factory(config)
}

/// Get list of available strategy names
pub fn available_strategies() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

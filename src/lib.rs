//! Trend Signal Engine
//!
//! Single-instrument trend-following decision engine: an indicator pipeline,
//! a market condition classifier, a signal generator and a position lifecycle
//! manager, driven one bar at a time by [`TradingSession`].

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod journal;
pub mod market;
pub mod pipeline;
pub mod position;
pub mod strategies;
pub mod types;

pub use config::Config;
pub use engine::{CycleOutcome, StrategyStatus, TradingSession};
pub use error::{ConfigError, EngineError};
pub use strategies::ut_trend::StrategyParams;
pub use strategies::Strategy;
pub use types::*;

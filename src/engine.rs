//! Trading session driver
//!
//! [`TradingSession`] owns the bounded bar buffer, the strategy and the
//! position manager for one instrument. Each accepted bar runs one
//! evaluation cycle: indicators, market conditions, then the strategy.
//! Fills come back through [`TradingSession::apply_fill`].

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::market::{self, MarketConditions};
use crate::pipeline::{self, IndicatorSnapshot};
use crate::position::{PositionManager, PositionSummary, RealizedStats};
use crate::strategies::{self, ut_trend::StrategyParams, Strategy};
use crate::types::{Bar, ExecutedSignal, Position, TradingSignal};
use crate::Config;

/// Result of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub signal: TradingSignal,
    pub conditions: MarketConditions,
}

/// Read-only status bundle for periodic display
#[derive(Debug, Clone, Serialize)]
pub struct StrategyStatus {
    pub symbol: String,
    pub strategy: &'static str,
    pub position: PositionSummary,
    pub last_signal: Option<TradingSignal>,
    pub signal_count: usize,
    pub conditions: MarketConditions,
    pub realized: RealizedStats,
    pub params: StrategyParams,
}

/// Single-instrument session
pub struct TradingSession {
    symbol: String,
    strategy: Box<dyn Strategy>,
    positions: PositionManager,
    bars: Vec<Bar>,
    max_history: usize,
    last_signal: Option<TradingSignal>,
    signal_count: usize,
    conditions: MarketConditions,
}

impl TradingSession {
    pub fn new(symbol: impl Into<String>, mut strategy: Box<dyn Strategy>, max_history: usize) -> Self {
        strategy.init();
        let positions = PositionManager::new(strategy.params().breakeven_offset);
        let max_history = max_history.max(pipeline::MIN_BARS);

        Self {
            symbol: symbol.into(),
            strategy,
            positions,
            bars: Vec::with_capacity(max_history + 1),
            max_history,
            last_signal: None,
            signal_count: 0,
            conditions: MarketConditions::InsufficientData,
        }
    }

    /// Build a session from a validated config
    pub fn from_config(config: &Config) -> Result<Self> {
        let strategy = strategies::create_strategy(config)?;
        Ok(Self::new(
            config.symbol.clone(),
            strategy,
            config.session.max_history,
        ))
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn params(&self) -> &StrategyParams {
        self.strategy.params()
    }

    pub fn position(&self) -> Option<&Position> {
        self.positions.position()
    }

    pub fn realized(&self) -> &RealizedStats {
        self.positions.stats()
    }

    /// Append one bar and run an evaluation cycle.
    ///
    /// A malformed or out-of-order bar is rejected and not appended.
    pub fn on_bar(&mut self, bar: Bar) -> Result<CycleOutcome, EngineError> {
        bar.validate()
            .map_err(|source| EngineError::InvalidBar { index: 0, source })?;
        self.check_order(&bar)?;

        self.bars.push(bar);
        self.evict();
        self.evaluate()
    }

    /// Append a batch and run a single evaluation cycle at its last bar.
    ///
    /// The batch may start with bars already in the buffer, as a feed
    /// replaying its whole window does. Those must match the buffered bars
    /// and are skipped; bars older than the buffer are taken as evicted.
    pub fn on_bars(&mut self, batch: &[Bar]) -> Result<CycleOutcome, EngineError> {
        let last = batch.last().ok_or(EngineError::EmptyBatch)?;
        pipeline::validate_series(batch)?;

        let fresh = &batch[self.buffered_prefix(batch)?..];
        if fresh.is_empty() {
            let newest = self.bars.last().map_or(last.timestamp, |b| b.timestamp);
            return Err(EngineError::ordering(newest, last.timestamp));
        }

        self.bars.extend_from_slice(fresh);
        self.evict();
        // Only the last bar gets a cycle; the others still count as time in trade
        let skipped = u32::try_from(fresh.len() - 1).unwrap_or(u32::MAX);
        self.positions.skip_bars(skipped);
        self.evaluate()
    }

    /// Feed an executed signal back into the position manager
    pub fn apply_fill(&mut self, fill: &ExecutedSignal) -> bool {
        self.positions.apply(fill)
    }

    pub fn position_summary(&self) -> PositionSummary {
        self.positions.summary()
    }

    pub fn status(&self) -> StrategyStatus {
        StrategyStatus {
            symbol: self.symbol.clone(),
            strategy: self.strategy.name(),
            position: self.positions.summary(),
            last_signal: self.last_signal.clone(),
            signal_count: self.signal_count,
            conditions: self.conditions,
            realized: self.positions.stats().clone(),
            params: self.strategy.params().clone(),
        }
    }

    fn check_order(&self, next: &Bar) -> Result<(), EngineError> {
        match self.bars.last() {
            Some(last) if next.timestamp <= last.timestamp => {
                Err(EngineError::ordering(last.timestamp, next.timestamp))
            }
            _ => Ok(()),
        }
    }

    /// Length of the leading part of `batch` the buffer already covers
    fn buffered_prefix(&self, batch: &[Bar]) -> Result<usize, EngineError> {
        let (Some(oldest), Some(newest)) = (self.bars.first(), self.bars.last()) else {
            return Ok(0);
        };

        let overlap = batch.partition_point(|b| b.timestamp <= newest.timestamp);
        for bar in batch[..overlap]
            .iter()
            .filter(|b| b.timestamp >= oldest.timestamp)
        {
            match self.bars.binary_search_by_key(&bar.timestamp, |b| b.timestamp) {
                Ok(i) if self.bars[i] == *bar => {}
                _ => return Err(EngineError::HistoryMismatch(bar.timestamp)),
            }
        }

        Ok(overlap)
    }

    fn evict(&mut self) {
        if self.bars.len() > self.max_history {
            let excess = self.bars.len() - self.max_history;
            self.bars.drain(..excess);
        }
    }

    fn evaluate(&mut self) -> Result<CycleOutcome, EngineError> {
        let snapshots: Vec<IndicatorSnapshot> =
            pipeline::compute_indicators(&self.bars, self.strategy.params())?;
        self.conditions = market::classify(&snapshots);

        let Some(bar) = self.bars.last() else {
            return Err(EngineError::EmptyBatch);
        };

        let signal = self.strategy.generate_signal(
            &snapshots,
            bar.close,
            bar.timestamp,
            &mut self.positions,
        );

        if signal.is_actionable() {
            self.signal_count += 1;
            self.last_signal = Some(signal.clone());
            info!(
                symbol = %self.symbol,
                signal = %signal.signal_type,
                price = signal.price,
                quantity = signal.quantity,
                reason = %signal.reason,
                "Signal generated"
            );
        } else {
            debug!(
                symbol = %self.symbol,
                reason = %signal.reason,
                conditions = %self.conditions,
                "No signal"
            );
        }

        Ok(CycleOutcome {
            signal,
            conditions: self.conditions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PositionStatus, SignalType};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap() + Duration::minutes(i)
    }

    fn bar(i: i64, close: f64) -> Bar {
        Bar::new_unchecked(ts(i), close, close + 0.5, close - 0.5, close, 1_000.0)
    }

    fn session() -> TradingSession {
        TradingSession::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_short_history_yields_no_signal() {
        let mut s = session();
        for i in 0..20 {
            let outcome = s.on_bar(bar(i, 100.0 + i as f64 * 0.1)).unwrap();
            assert_eq!(outcome.signal.signal_type, SignalType::None);
            assert_eq!(outcome.conditions, MarketConditions::InsufficientData);
        }
        assert_eq!(s.status().signal_count, 0);
    }

    #[test]
    fn test_out_of_order_bar_rejected() {
        let mut s = session();
        s.on_bar(bar(5, 100.0)).unwrap();

        let err = s.on_bar(bar(3, 100.0)).unwrap_err();
        assert!(matches!(err, EngineError::NonMonotonicTimestamp { .. }));
        let err = s.on_bar(bar(5, 100.0)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTimestamp(_)));
        assert_eq!(s.bars().len(), 1);
    }

    #[test]
    fn test_invalid_bar_rejected() {
        let mut s = session();
        let bad = Bar::new_unchecked(ts(0), 100.0, 99.0, 101.0, 100.0, 1.0);
        assert!(matches!(s.on_bar(bad), Err(EngineError::InvalidBar { .. })));
        assert!(s.bars().is_empty());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut s = session();
        assert!(matches!(s.on_bars(&[]), Err(EngineError::EmptyBatch)));
    }

    #[test]
    fn test_batch_without_new_bars_rejected() {
        let mut s = session();
        s.on_bar(bar(10, 100.0)).unwrap();

        let older: Vec<Bar> = (5..8).map(|i| bar(i, 100.0)).collect();
        assert!(matches!(
            s.on_bars(&older),
            Err(EngineError::NonMonotonicTimestamp { .. })
        ));
        assert!(matches!(
            s.on_bars(&[bar(10, 100.0)]),
            Err(EngineError::DuplicateTimestamp(_))
        ));
        assert_eq!(s.bars().len(), 1);
    }

    #[test]
    fn test_batch_repeating_history_appends_only_new_bars() {
        let mut s = session();
        let history: Vec<Bar> = (0..121).map(|i| bar(i, 100.0 + i as f64 * 0.1)).collect();

        s.on_bars(&history[..120]).unwrap();
        s.on_bars(&history).unwrap();

        assert_eq!(s.bars().len(), 121);
        assert_eq!(s.bars()[120].timestamp, ts(120));
        assert_eq!(s.bars(), &history[..]);
    }

    #[test]
    fn test_batch_conflicting_with_history_rejected() {
        let mut s = session();
        let history: Vec<Bar> = (0..121).map(|i| bar(i, 100.0)).collect();
        s.on_bars(&history[..120]).unwrap();

        let mut revised = history.clone();
        revised[119].close = 100.2;
        let err = s.on_bars(&revised).unwrap_err();
        assert!(matches!(err, EngineError::HistoryMismatch(t) if t == ts(119)));

        // A bar missing from the buffer is a conflict too
        assert_eq!(s.bars().len(), 120);

        let gapped: Vec<Bar> = history[..50].iter().chain(&history[51..]).copied().collect();
        let mut fresh = session();
        fresh.on_bars(&gapped[..110]).unwrap();
        assert!(matches!(
            fresh.on_bars(&history),
            Err(EngineError::HistoryMismatch(t)) if t == ts(50)
        ));
    }

    #[test]
    fn test_batch_bars_count_toward_time_in_trade() {
        let mut s = session();
        let signal = TradingSignal::buy(ts(0), 100.0, 100.0, "Entry: test", 0.7, 96.4, 101.8);
        assert!(s.apply_fill(&ExecutedSignal::at_signal(signal)));

        let batch: Vec<Bar> = (1..4).map(|i| bar(i, 100.0)).collect();
        s.on_bars(&batch).unwrap();
        assert_eq!(s.position().unwrap().bars_in_trade, 3);

        s.on_bar(bar(4, 100.0)).unwrap();
        assert_eq!(s.position().unwrap().bars_in_trade, 4);
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut config = Config::default();
        config.session.max_history = 120;
        let mut s = TradingSession::from_config(&config).unwrap();

        let batch: Vec<Bar> = (0..200).map(|i| bar(i, 100.0)).collect();
        s.on_bars(&batch).unwrap();

        assert_eq!(s.bars().len(), 120);
        assert_eq!(s.bars()[0].timestamp, ts(80));
    }

    #[test]
    fn test_apply_fill_updates_summary() {
        let mut s = session();
        let signal = TradingSignal::buy(ts(0), 100.0, 100.0, "Entry: test", 0.7, 96.4, 101.8);
        assert!(s.apply_fill(&ExecutedSignal::at_signal(signal.clone())));
        assert!(!s.apply_fill(&ExecutedSignal::at_signal(signal)));

        let summary = s.position_summary();
        assert_eq!(summary.status, PositionStatus::Long);
        assert_eq!(summary.quantity, 100.0);
    }

    #[test]
    fn test_status_serializes() {
        let s = session();
        let json = serde_json::to_value(s.status()).unwrap();
        assert_eq!(json["symbol"], "SPY");
        assert_eq!(json["strategy"], "ut_trend");
        assert_eq!(json["position"]["status"], "FLAT");
        assert_eq!(json["conditions"]["state"], "insufficient_data");
    }
}

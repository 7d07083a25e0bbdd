//! Indicator pipeline
//!
//! Turns an ordered bar series into one [`IndicatorSnapshot`] per bar.
//! Structurally invalid input (bad bars, non-increasing timestamps) is
//! rejected; everything else degrades to undefined fields.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::indicators::{self, Series, TrendDirection};
use crate::strategies::ut_trend::StrategyParams;
use crate::types::Bar;

/// Minimum history before any indicator is derived
pub const MIN_BARS: usize = 100;

/// Indicator values derived for a single bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub close: f64,
    pub low: f64,
    pub volume: f64,
    pub atr: Option<f64>,
    /// ATR as a fraction of close
    pub atr_pct: Option<f64>,
    /// Bollinger width as a fraction of the basis
    pub bb_width: Option<f64>,
    pub adx: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_hist: Option<f64>,
    pub ema_pullback: Option<f64>,
    pub donchian_high: Option<f64>,
    pub donchian_low: Option<f64>,
    pub ut_stop: Option<f64>,
    pub ut_direction: TrendDirection,
    pub vwap: Option<f64>,
    pub volume_sma: Option<f64>,
}

impl IndicatorSnapshot {
    /// Snapshot with every indicator undefined
    pub fn undefined(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp,
            close: bar.close,
            low: bar.low,
            volume: bar.volume,
            atr: None,
            atr_pct: None,
            bb_width: None,
            adx: None,
            rsi: None,
            macd_hist: None,
            ema_pullback: None,
            donchian_high: None,
            donchian_low: None,
            ut_stop: None,
            ut_direction: TrendDirection::Neutral,
            vwap: None,
            volume_sma: None,
        }
    }
}

/// Check every bar and the strict ordering of timestamps
pub fn validate_series(bars: &[Bar]) -> Result<(), EngineError> {
    for (index, bar) in bars.iter().enumerate() {
        bar.validate()
            .map_err(|source| EngineError::InvalidBar { index, source })?;
    }

    if let Some((prev, next)) = bars
        .iter()
        .tuple_windows()
        .find(|(prev, next)| next.timestamp <= prev.timestamp)
    {
        return Err(EngineError::ordering(prev.timestamp, next.timestamp));
    }

    Ok(())
}

/// Compute one snapshot per bar.
///
/// With fewer than [`MIN_BARS`] bars every snapshot is returned undefined.
pub fn compute_indicators(
    bars: &[Bar],
    params: &StrategyParams,
) -> Result<Vec<IndicatorSnapshot>, EngineError> {
    validate_series(bars)?;

    if bars.len() < MIN_BARS {
        debug!(
            bars = bars.len(),
            required = MIN_BARS,
            "Insufficient history, indicators undefined"
        );
        return Ok(bars.iter().map(IndicatorSnapshot::undefined).collect());
    }

    let timestamps: Vec<_> = bars.iter().map(|b| b.timestamp).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let atr = indicators::atr(&high, &low, &close, params.atr_period);
    let atr_pct = indicators::atr_fraction(&atr, &close);
    let bb_width = indicators::bollinger_width(&close, params.bb_period, params.bb_mult);
    let adx = indicators::adx(&high, &low, &close, params.adx_period);
    let rsi = indicators::rsi(&close, params.rsi_period);
    let macd_hist =
        indicators::macd_histogram(&close, params.macd_fast, params.macd_slow, params.macd_signal);
    let ema_pullback = indicators::ema(&close, params.pullback_ema_period);
    let (donchian_high, donchian_low) =
        indicators::donchian(&high, &low, params.donchian_period);

    let ut_loss: Series = indicators::atr(&high, &low, &close, params.ut_atr_period)
        .into_iter()
        .map(|a| a.map(|a| a * params.ut_key_value))
        .collect();
    let (ut_stop, ut_direction) = indicators::ut_bot(&close, &ut_loss);

    let tz = params.vwap_tz().unwrap_or_else(|err| {
        warn!(error = %err, "Falling back to UTC sessions for VWAP");
        chrono_tz::UTC
    });
    let vwap = indicators::session_vwap(&timestamps, &high, &low, &close, &volume, tz);
    let volume_sma = indicators::sma(&volume, params.volume_sma_period);

    let snapshots: Vec<IndicatorSnapshot> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorSnapshot {
            timestamp: bar.timestamp,
            close: bar.close,
            low: bar.low,
            volume: bar.volume,
            atr: atr[i],
            atr_pct: atr_pct[i],
            bb_width: bb_width[i],
            adx: adx[i],
            rsi: rsi[i],
            macd_hist: macd_hist[i],
            ema_pullback: ema_pullback[i],
            donchian_high: donchian_high[i],
            donchian_low: donchian_low[i],
            ut_stop: ut_stop[i],
            ut_direction: ut_direction[i],
            vwap: vwap[i],
            volume_sma: volume_sma[i],
        })
        .collect();

    if let Some(latest) = snapshots.last() {
        let degraded = degraded_fields(latest, bars.len(), params);
        if !degraded.is_empty() {
            warn!(
                timestamp = %latest.timestamp,
                indicators = %degraded.join(", "),
                "Indicators undefined past warmup on latest bar"
            );
        }
    }

    Ok(snapshots)
}

/// Fields of `snap` still undefined although `bars` of history cover their warmup
fn degraded_fields(
    snap: &IndicatorSnapshot,
    bars: usize,
    params: &StrategyParams,
) -> Vec<&'static str> {
    let fields = [
        ("atr", snap.atr, params.atr_period),
        ("atr_pct", snap.atr_pct, params.atr_period),
        ("bb_width", snap.bb_width, params.bb_period),
        ("adx", snap.adx, params.adx_period * 2),
        ("rsi", snap.rsi, params.rsi_period + 1),
        ("macd_hist", snap.macd_hist, params.macd_slow + params.macd_signal - 1),
        ("ema_pullback", snap.ema_pullback, params.pullback_ema_period),
        ("donchian_high", snap.donchian_high, params.donchian_period),
        ("donchian_low", snap.donchian_low, params.donchian_period),
        ("ut_stop", snap.ut_stop, params.ut_atr_period),
        ("vwap", snap.vwap, 1),
        ("volume_sma", snap.volume_sma, params.volume_sma_period),
    ];

    fields
        .iter()
        .filter(|(_, value, warmup)| value.is_none() && bars >= *warmup)
        .map(|(name, ..)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn trending_bars(count: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2025, 1, 2, 14, 30, 0).unwrap();
        (0..count)
            .map(|i| {
                let base = 200.0 + i as f64 * 0.5 + (i % 4) as f64 * 0.3;
                Bar::new_unchecked(
                    start + Duration::minutes(5 * i as i64),
                    base - 0.2,
                    base + 1.0,
                    base - 1.0,
                    base,
                    10_000.0 + i as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_short_series_is_undefined() {
        let bars = trending_bars(MIN_BARS - 1);
        let snapshots = compute_indicators(&bars, &StrategyParams::default()).unwrap();

        assert_eq!(snapshots.len(), bars.len());
        for snap in &snapshots {
            assert_eq!(snap.atr, None);
            assert_eq!(snap.adx, None);
            assert_eq!(snap.rsi, None);
            assert_eq!(snap.macd_hist, None);
            assert_eq!(snap.ut_stop, None);
            assert_eq!(snap.vwap, None);
            assert_eq!(snap.ut_direction, TrendDirection::Neutral);
        }
    }

    #[test]
    fn test_full_series_is_aligned_and_defined() {
        let bars = trending_bars(150);
        let snapshots = compute_indicators(&bars, &StrategyParams::default()).unwrap();

        assert_eq!(snapshots.len(), 150);
        let last = snapshots.last().unwrap();
        assert_eq!(last.timestamp, bars[149].timestamp);
        assert!(last.atr.is_some());
        assert!(last.atr_pct.is_some());
        assert!(last.bb_width.is_some());
        assert!(last.adx.is_some());
        assert!(last.rsi.is_some());
        assert!(last.macd_hist.is_some());
        assert!(last.ema_pullback.is_some());
        assert!(last.donchian_high.is_some());
        assert!(last.ut_stop.is_some());
        assert!(last.vwap.is_some());
        // Warmup still undefined at the head
        assert_eq!(snapshots[0].atr, None);
        assert_eq!(snapshots[5].rsi, None);
    }

    #[test]
    fn test_healthy_series_has_no_degraded_fields() {
        let bars = trending_bars(150);
        let params = StrategyParams::default();
        let snapshots = compute_indicators(&bars, &params).unwrap();
        let last = snapshots.last().unwrap();

        assert!(degraded_fields(last, bars.len(), &params).is_empty());
        assert!(last.volume_sma.is_some());
        assert_eq!(last.low, bars[149].low);
        assert_eq!(last.volume, bars[149].volume);
    }

    #[test]
    fn test_degraded_fields_reported_past_warmup() {
        let mut bars = trending_bars(150);
        // Zero volume leaves VWAP without a denominator
        for bar in bars.iter_mut() {
            bar.volume = 0.0;
        }
        let params = StrategyParams::default();
        let snapshots = compute_indicators(&bars, &params).unwrap();
        let last = snapshots.last().unwrap();
        assert_eq!(degraded_fields(last, bars.len(), &params), vec!["vwap"]);

        // Undefined during warmup is not degradation
        let mut early = last.clone();
        early.vwap = Some(200.0);
        early.macd_hist = None;
        assert!(degraded_fields(&early, 10, &params).is_empty());
        assert_eq!(degraded_fields(&early, bars.len(), &params), vec!["macd_hist"]);
    }

    #[test]
    fn test_rejects_non_monotonic_timestamps() {
        let mut bars = trending_bars(120);
        bars.swap(10, 11);
        let err = compute_indicators(&bars, &StrategyParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        let mut bars = trending_bars(120);
        bars[20].timestamp = bars[19].timestamp;
        let err = compute_indicators(&bars, &StrategyParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTimestamp(_)));
    }

    #[test]
    fn test_rejects_invalid_bar() {
        let mut bars = trending_bars(10);
        bars[3].high = bars[3].low - 1.0;
        let err = compute_indicators(&bars, &StrategyParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidBar { index: 3, .. }));
    }
}

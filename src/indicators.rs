//! Technical indicators
//!
//! Explicit rolling-window and recursive-smoothing implementations over
//! price slices. Every function returns one value per input element, aligned
//! by index, with `None` wherever the lookback window is not yet filled or the
//! arithmetic produced a non-finite value.
//!
//! Exponential averages are driven by the `ta` crate; Wilder smoothing (RMA)
//! is implemented here because `ta` seeds its averages differently.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ta::indicators::{
    ExponentialMovingAverage, Maximum, Minimum, MovingAverageConvergenceDivergence,
};
use ta::Next;

// =============================================================================
// Type Aliases for Complex Return Types
// =============================================================================

/// Optional value per bar
pub type Series = Vec<Option<f64>>;

/// Type alias for two-line indicators (line1, line2)
pub type DualLineOutput = (Series, Series);

/// Keep finite values, drop NaN and infinities
#[inline]
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Whether every input slice has the same length
fn aligned(lengths: &[usize]) -> bool {
    lengths.windows(2).all(|w| w[0] == w[1])
}

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Series {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut result = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            result.push(finite(sum / period as f64));
        } else {
            result.push(None);
        }
    }

    result
}

/// Calculate Exponential Moving Average (smoothing 2/(n+1), seeded with the first value)
pub fn ema(values: &[f64], period: usize) -> Series {
    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let ema_val = indicator.next(value);
            if i + 1 >= period {
                finite(ema_val)
            } else {
                None
            }
        })
        .collect()
}

/// Wilder's smoothed moving average over a series that may start undefined.
///
/// Leading `None` values are skipped. The first output is the simple average
/// of the first `period` defined inputs, after which
/// `rma = prev + (x - prev) / period`.
pub fn rma(values: &[Option<f64>], period: usize) -> Series {
    let mut result = vec![None; values.len()];
    if period == 0 {
        return result;
    }

    let mut seed_sum = 0.0;
    let mut seen = 0usize;
    let mut current: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(x) = *value else {
            continue;
        };

        match current {
            None => {
                seed_sum += x;
                seen += 1;
                if seen == period {
                    current = finite(seed_sum / period as f64);
                    result[i] = current;
                }
            }
            Some(prev) => {
                let next = prev + (x - prev) / period as f64;
                current = finite(next);
                result[i] = current;
            }
        }
    }

    result
}

/// Wilder's smoothing of a fully-defined series
pub fn rma_values(values: &[f64], period: usize) -> Series {
    let wrapped: Vec<Option<f64>> = values.iter().map(|&v| Some(v)).collect();
    rma(&wrapped, period)
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate True Range. The first bar uses high - low.
///
/// Misaligned inputs yield NaN for every bar of `high`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    if !aligned(&[high.len(), low.len(), close.len()]) {
        return vec![f64::NAN; high.len()];
    }

    let mut tr = Vec::with_capacity(high.len());

    for i in 0..high.len() {
        let hl = high[i] - low[i];
        let tr_value = if i == 0 {
            hl
        } else {
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Calculate Average True Range (Wilder smoothing of the true range)
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    if !aligned(&[high.len(), low.len(), close.len()]) {
        return vec![None; high.len()];
    }
    rma_values(&true_range(high, low, close), period)
}

/// ATR as a fraction of close
pub fn atr_fraction(atr_values: &[Option<f64>], close: &[f64]) -> Series {
    atr_values
        .iter()
        .zip(close.iter())
        .map(|(atr_opt, &price)| atr_opt.and_then(|a| finite(a / price)))
        .collect()
}

/// Bollinger band width as a fraction of the basis: `(upper - lower) / basis`.
///
/// Uses the population standard deviation. A zero basis is undefined.
pub fn bollinger_width(values: &[f64], period: usize, num_std: f64) -> Series {
    let basis = sma(values, period);

    basis
        .iter()
        .enumerate()
        .map(|(i, mid)| {
            let mid = (*mid)?;
            if mid == 0.0 {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let variance = window.iter().map(|&x| (x - mid).powi(2)).sum::<f64>() / period as f64;
            let dev = variance.sqrt() * num_std;
            finite(((mid + dev) - (mid - dev)) / mid)
        })
        .collect()
}

/// Donchian channel: rolling highest high and lowest low
pub fn donchian(high: &[f64], low: &[f64], period: usize) -> DualLineOutput {
    if !aligned(&[high.len(), low.len()]) {
        return (vec![None; high.len()], vec![None; low.len()]);
    }
    let (mut max, mut min) = match (Maximum::new(period), Minimum::new(period)) {
        (Ok(max), Ok(min)) => (max, min),
        _ => return (vec![None; high.len()], vec![None; low.len()]),
    };

    let mut upper = Vec::with_capacity(high.len());
    let mut lower = Vec::with_capacity(low.len());

    for i in 0..high.len() {
        let hi = max.next(high[i]);
        let lo = min.next(low[i]);
        if i + 1 >= period {
            upper.push(finite(hi));
            lower.push(finite(lo));
        } else {
            upper.push(None);
            lower.push(None);
        }
    }

    (upper, lower)
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI with Wilder smoothing of gains and losses.
///
/// An average loss of exactly zero resolves to 100.
pub fn rsi(values: &[f64], period: usize) -> Series {
    if values.is_empty() {
        return vec![];
    }

    let mut gains = Vec::with_capacity(values.len());
    let mut losses = Vec::with_capacity(values.len());
    gains.push(None);
    losses.push(None);

    for w in values.windows(2) {
        let change = w[1] - w[0];
        gains.push(Some(change.max(0.0)));
        losses.push(Some((-change).max(0.0)));
    }

    let avg_gains = rma(&gains, period);
    let avg_losses = rma(&losses, period);

    avg_gains
        .into_iter()
        .zip(avg_losses)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(_), Some(loss)) if loss == 0.0 => Some(100.0),
            (Some(gain), Some(loss)) => finite(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        })
        .collect()
}

/// MACD histogram: (EMA fast - EMA slow) - EMA(signal) of that line.
///
/// Defined once the slow average and the signal line have both warmed up.
pub fn macd_histogram(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Series {
    let mut indicator =
        match MovingAverageConvergenceDivergence::new(fast_period, slow_period, signal_period) {
            Ok(i) => i,
            Err(_) => return vec![None; values.len()],
        };

    let warmup = slow_period + signal_period - 1;

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let out = indicator.next(value);
            if i + 1 >= warmup {
                finite(out.histogram)
            } else {
                None
            }
        })
        .collect()
}

// =============================================================================
// Trend Indicators
// =============================================================================

/// Calculate +DI / -DI using Wilder smoothing of directional movement
pub fn dmi(high: &[f64], low: &[f64], close: &[f64], period: usize) -> DualLineOutput {
    let n = high.len();
    if !aligned(&[n, low.len(), close.len()]) {
        return (vec![None; n], vec![None; n]);
    }

    let mut plus_dm = vec![Some(0.0); n];
    let mut minus_dm = vec![Some(0.0); n];

    for i in 1..n {
        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];

        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = Some(up_move);
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = Some(down_move);
        }
    }

    let atr_values = atr(high, low, close, period);
    let plus_smooth = rma(&plus_dm, period);
    let minus_smooth = rma(&minus_dm, period);

    let to_di = |smooth: &Series| -> Series {
        smooth
            .iter()
            .zip(atr_values.iter())
            .map(|(dm, atr)| match (dm, atr) {
                (Some(dm), Some(atr)) if *atr != 0.0 => finite(100.0 * dm / atr),
                _ => None,
            })
            .collect()
    };

    (to_di(&plus_smooth), to_di(&minus_smooth))
}

/// Calculate Average Directional Index (Wilder smoothing of DX)
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    let (plus_di, minus_di) = dmi(high, low, close, period);

    let dx: Series = plus_di
        .iter()
        .zip(minus_di.iter())
        .map(|(pdi, mdi)| match (pdi, mdi) {
            (Some(pdi), Some(mdi)) => {
                let sum = pdi + mdi;
                if sum == 0.0 {
                    Some(0.0)
                } else {
                    finite(100.0 * (pdi - mdi).abs() / sum)
                }
            }
            _ => None,
        })
        .collect();

    rma(&dx, period)
}

/// Latched direction of the UT Bot trailing stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendDirection {
    Long,
    Short,
    #[default]
    Neutral,
}

/// UT Bot style trailing stop with a latched direction.
///
/// `n_loss` is the per-bar stop distance (key value x ATR). While price stays
/// above the prior stop the stop only ratchets up; otherwise it is reset to
/// `close + n_loss`. The direction flips only on an explicit cross of the
/// stop and otherwise keeps its last non-neutral value.
pub fn ut_bot(close: &[f64], n_loss: &[Option<f64>]) -> (Series, Vec<TrendDirection>) {
    let mut stops: Series = vec![None; close.len()];
    let mut directions = vec![TrendDirection::Neutral; close.len()];
    let mut last_direction = TrendDirection::Neutral;

    for i in 0..close.len() {
        let src = close[i];
        let prev_stop = if i > 0 { stops[i - 1] } else { None };

        stops[i] = n_loss.get(i).copied().flatten().and_then(|loss| {
            let stop = match prev_stop {
                Some(prev) if src > prev => prev.max(src - loss),
                _ => src + loss,
            };
            finite(stop)
        });

        if let (Some(prev), Some(stop)) = (prev_stop, stops[i]) {
            let prev_src = close[i - 1];
            if prev_src < prev && src > stop {
                last_direction = TrendDirection::Long;
            } else if prev_src > prev && src < stop {
                last_direction = TrendDirection::Short;
            }
        }
        directions[i] = last_direction;
    }

    (stops, directions)
}

// =============================================================================
// Volume Indicators
// =============================================================================

/// Session VWAP, reset whenever the calendar date in `tz` changes
pub fn session_vwap(
    timestamps: &[DateTime<Utc>],
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    tz: Tz,
) -> Series {
    let n = close.len();
    if !aligned(&[timestamps.len(), high.len(), low.len(), n, volume.len()]) {
        return vec![None; n];
    }

    let mut result = Vec::with_capacity(close.len());
    let mut session = None;
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;

    for i in 0..close.len() {
        let date = timestamps[i].with_timezone(&tz).date_naive();
        if session != Some(date) {
            session = Some(date);
            cum_pv = 0.0;
            cum_vol = 0.0;
        }

        let typical = (high[i] + low[i] + close[i]) / 3.0;
        cum_pv += typical * volume[i];
        cum_vol += volume[i];

        if cum_vol > 0.0 {
            result.push(finite(cum_pv / cum_vol));
        } else {
            result.push(None);
        }
    }

    result
}

// =============================================================================
// Tests
// =============================================================================

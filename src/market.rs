//! Market condition classification
//!
//! Reduces the latest indicator snapshot to qualitative labels for display.
//! Informational only: nothing in the signal path depends on it.

use serde::{Deserialize, Serialize};

use crate::pipeline::IndicatorSnapshot;

/// Minimum snapshots before conditions are assessed
pub const MIN_CLASSIFY_BARS: usize = 50;

const STRONG_ADX: f64 = 25.0;
const WEAK_ADX: f64 = 15.0;
const HIGH_ATR_PCT: f64 = 0.03;
const LOW_ATR_PCT: f64 = 0.015;
const RSI_MIDPOINT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendQuality {
    Strong,
    Moderate,
    Weak,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    High,
    Normal,
    Low,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Momentum {
    Bullish,
    Bearish,
    Neutral,
    Undefined,
}

/// Qualitative view of the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MarketConditions {
    InsufficientData,
    Assessed {
        trend: TrendQuality,
        volatility: VolatilityLevel,
        momentum: Momentum,
    },
}

/// Classify the latest snapshot of `history`
pub fn classify(history: &[IndicatorSnapshot]) -> MarketConditions {
    if history.len() < MIN_CLASSIFY_BARS {
        return MarketConditions::InsufficientData;
    }
    let Some(latest) = history.last() else {
        return MarketConditions::InsufficientData;
    };

    MarketConditions::Assessed {
        trend: trend_quality(latest.adx),
        volatility: volatility_level(latest.atr_pct),
        momentum: momentum(latest.rsi, latest.macd_hist),
    }
}

fn trend_quality(adx: Option<f64>) -> TrendQuality {
    match adx {
        Some(adx) if adx > STRONG_ADX => TrendQuality::Strong,
        Some(adx) if adx < WEAK_ADX => TrendQuality::Weak,
        Some(_) => TrendQuality::Moderate,
        None => TrendQuality::Undefined,
    }
}

fn volatility_level(atr_pct: Option<f64>) -> VolatilityLevel {
    match atr_pct {
        Some(pct) if pct > HIGH_ATR_PCT => VolatilityLevel::High,
        Some(pct) if pct < LOW_ATR_PCT => VolatilityLevel::Low,
        Some(_) => VolatilityLevel::Normal,
        None => VolatilityLevel::Undefined,
    }
}

fn momentum(rsi: Option<f64>, macd_hist: Option<f64>) -> Momentum {
    match (rsi, macd_hist) {
        (Some(rsi), Some(hist)) if rsi > RSI_MIDPOINT && hist > 0.0 => Momentum::Bullish,
        (Some(rsi), Some(hist)) if rsi < RSI_MIDPOINT && hist < 0.0 => Momentum::Bearish,
        (Some(_), Some(_)) => Momentum::Neutral,
        _ => Momentum::Undefined,
    }
}

impl std::fmt::Display for MarketConditions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketConditions::InsufficientData => write!(f, "insufficient_data"),
            MarketConditions::Assessed {
                trend,
                volatility,
                momentum,
            } => write!(
                f,
                "trend={:?} volatility={:?} momentum={:?}",
                trend, volatility, momentum
            ),
        }
    }
}

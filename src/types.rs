//! Core data types used across the engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for bar data
#[derive(Debug, Error)]
pub enum BarValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be finite and >= 0")]
    InvalidVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be finite and positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV price bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a new bar with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarValidationError> {
        let bar = Self::new_unchecked(timestamp, open, high, low, close, volume);
        bar.validate()?;
        Ok(bar)
    }

    /// Create a bar without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate the bar data
    pub fn validate(&self) -> Result<(), BarValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(BarValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(BarValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(BarValidationError::InvalidVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(BarValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(BarValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }
}

/// Kind of trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    None,
    Buy,
    Sell,
    PartialSell,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::None => "NONE",
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::PartialSell => "PARTIAL_SELL",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading intent emitted by a strategy. Not an executed fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_type: SignalType,
    pub timestamp: DateTime<Utc>,
    /// Reference price the signal was evaluated at
    pub price: f64,
    pub quantity: f64,
    pub reason: String,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Only populated on BUY
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Only populated on BUY
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

impl TradingSignal {
    /// A no-op signal
    pub fn none(timestamp: DateTime<Utc>, price: f64, reason: impl Into<String>) -> Self {
        Self {
            signal_type: SignalType::None,
            timestamp,
            price,
            quantity: 0.0,
            reason: reason.into(),
            confidence: 0.0,
            stop_loss: None,
            take_profit: None,
        }
    }

    /// Entry signal with protective levels attached
    pub fn buy(
        timestamp: DateTime<Utc>,
        price: f64,
        quantity: f64,
        reason: impl Into<String>,
        confidence: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        Self {
            signal_type: SignalType::Buy,
            timestamp,
            price,
            quantity,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        }
    }

    /// Exit signal; `signal_type` must be `Sell` or `PartialSell`
    pub fn exit(
        signal_type: SignalType,
        timestamp: DateTime<Utc>,
        price: f64,
        quantity: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            signal_type,
            timestamp,
            price,
            quantity,
            reason: reason.into(),
            confidence: 1.0,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.signal_type != SignalType::None
    }
}

/// A signal together with the fill reported back by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedSignal {
    pub signal: TradingSignal,
    pub fill_price: f64,
    pub fill_quantity: f64,
    pub timestamp: DateTime<Utc>,
}

impl ExecutedSignal {
    /// Fill exactly at the signal's reference price and quantity
    pub fn at_signal(signal: TradingSignal) -> Self {
        Self {
            fill_price: signal.price,
            fill_quantity: signal.quantity,
            timestamp: signal.timestamp,
            signal,
        }
    }
}

/// Position lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Flat,
    Long,
    Partial,
}

/// The single open position of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub status: PositionStatus,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub initial_quantity: f64,
    pub quantity: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub first_target_hit: bool,
    pub bars_in_trade: u32,
    /// Highest price marked since entry
    pub highest_price: f64,
}

impl Position {
    pub fn unrealized_pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 19, 13, 45, 0).unwrap()
    }

    #[test]
    fn test_valid_bar() {
        let bar = Bar::new(ts(), 100.0, 101.0, 99.0, 100.5, 1_000.0);
        assert!(bar.is_ok());
    }

    #[test]
    fn test_bar_rejects_high_below_low() {
        let err = Bar::new(ts(), 100.0, 98.0, 99.0, 98.5, 1_000.0).unwrap_err();
        assert!(matches!(err, BarValidationError::HighLessThanLow { .. }));
    }

    #[test]
    fn test_bar_rejects_nan_price() {
        let err = Bar::new(ts(), f64::NAN, 101.0, 99.0, 100.0, 10.0).unwrap_err();
        assert!(matches!(err, BarValidationError::NonPositivePrice { .. }));
    }

    #[test]
    fn test_bar_rejects_close_out_of_range() {
        let err = Bar::new(ts(), 100.0, 101.0, 99.0, 102.0, 10.0).unwrap_err();
        assert!(matches!(err, BarValidationError::CloseOutOfRange { .. }));
    }

    #[test]
    fn test_bar_rejects_negative_volume() {
        let err = Bar::new(ts(), 100.0, 101.0, 99.0, 100.0, -1.0).unwrap_err();
        assert!(matches!(err, BarValidationError::InvalidVolume(_)));
    }

    #[test]
    fn test_buy_signal_clamps_confidence() {
        let signal = TradingSignal::buy(ts(), 100.0, 10.0, "Entry: Breakout", 1.7, 98.0, 103.0);
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.stop_loss, Some(98.0));
        assert!(signal.is_actionable());
    }

    #[test]
    fn test_signal_type_serializes_screaming_case() {
        let json = serde_json::to_string(&SignalType::PartialSell).unwrap();
        assert_eq!(json, "\"PARTIAL_SELL\"");
        assert_eq!(SignalType::PartialSell.to_string(), "PARTIAL_SELL");
    }
}

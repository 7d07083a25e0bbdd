//! UT Trend Configuration

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Parameters for the UT trend strategy and the indicator pipeline feeding it.
///
/// Loaded once at session start and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Shares bought on every entry (default: 100)
    #[serde(default = "default_shares_per_trade")]
    pub shares_per_trade: f64,

    /// Initial stop distance in ATR (default: 1.8)
    #[serde(default = "default_stop_atr")]
    pub stop_atr_multiple: f64,

    /// First profit target distance in ATR (default: 0.9)
    #[serde(default = "default_target_atr")]
    pub target_atr_multiple: f64,

    /// Trailing stop distance in ATR once the first target is hit (default: 2.4)
    #[serde(default = "default_trailing_atr")]
    pub trailing_atr_multiple: f64,

    /// Percentage of the position sold at the first target (default: 75)
    #[serde(default = "default_partial_exit_pct")]
    pub partial_exit_pct: f64,

    /// Move the stop to breakeven once price is this many ATR above entry.
    /// `null` disables the trigger (default: 0.8)
    #[serde(default = "default_breakeven_trigger")]
    pub breakeven_trigger_atr: Option<f64>,

    /// Price offset above entry used for the breakeven stop (default: 0.01)
    #[serde(default = "default_breakeven_offset")]
    pub breakeven_offset: f64,

    /// Exit after this many bars in a trade (default: 720)
    #[serde(default = "default_max_bars_in_trade")]
    pub max_bars_in_trade: u32,

    // Regime filters
    #[serde(default = "default_period_14")]
    pub atr_period: usize,
    #[serde(default = "default_period_14")]
    pub adx_period: usize,
    /// Minimum ADX for entries (default: 20)
    #[serde(default = "default_min_adx")]
    pub min_adx: f64,
    /// Minimum ATR as a fraction of close (default: 0.002)
    #[serde(default = "default_min_atr_pct")]
    pub min_atr_pct: f64,
    #[serde(default = "default_bb_period")]
    pub bb_period: usize,
    #[serde(default = "default_bb_mult")]
    pub bb_mult: f64,
    /// Minimum Bollinger width fraction (default: 0.0012)
    #[serde(default = "default_min_bb_width")]
    pub min_bb_width: f64,

    // Momentum confirmations
    #[serde(default = "default_period_14")]
    pub rsi_period: usize,
    /// RSI must be above this level to confirm (default: 50)
    #[serde(default = "default_rsi_threshold")]
    pub rsi_threshold: f64,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    /// MACD histogram must be above this absolute level to confirm (default: -0.5).
    /// Expressed in price units, so it needs calibrating per instrument.
    #[serde(default = "default_macd_hist_tolerance")]
    pub macd_hist_tolerance: f64,
    /// Count volume above its average as a third confirmation (default: false)
    #[serde(default)]
    pub use_volume_confirm: bool,
    #[serde(default = "default_volume_sma_period")]
    pub volume_sma_period: usize,
    /// Volume must reach this multiple of its average to confirm (default: 1.1)
    #[serde(default = "default_volume_mult")]
    pub volume_mult: f64,
    /// Number of confirmations required out of RSI, MACD and, when enabled,
    /// volume (default: 2)
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: usize,

    // Entry filters
    /// Only enter while the UT Bot direction is long (default: false)
    #[serde(default)]
    pub use_ut_filter: bool,
    /// Bars without entries after a losing close; 0 disables (default: 0)
    #[serde(default)]
    pub cooldown_bars: u32,

    // Entry triggers
    #[serde(default = "default_true")]
    pub enable_pullback: bool,
    #[serde(default = "default_pullback_ema")]
    pub pullback_ema_period: usize,
    /// Minimum depth of the pullback below the EMA, in ATR, measured on the
    /// bar before the cross. 0 disables the check (default: 0)
    #[serde(default)]
    pub pullback_min_atr: f64,
    /// Require pullback entries to close above the session VWAP after
    /// probing below it (default: false)
    #[serde(default)]
    pub enable_vwap_filter: bool,
    /// Minimum dip of the bar's low under VWAP, in ATR (default: 0.15)
    #[serde(default = "default_vwap_dev_atr")]
    pub vwap_dev_atr: f64,
    #[serde(default = "default_true")]
    pub enable_breakout: bool,
    #[serde(default = "default_donchian_period")]
    pub donchian_period: usize,
    #[serde(default = "default_true")]
    pub enable_ut_cross: bool,
    /// UT Bot key value: stop distance in ATR (default: 3.0)
    #[serde(default = "default_ut_key_value")]
    pub ut_key_value: f64,
    #[serde(default = "default_ut_atr_period")]
    pub ut_atr_period: usize,

    /// Timezone whose calendar date resets the session VWAP
    #[serde(default = "default_vwap_timezone")]
    pub vwap_timezone: String,
}

fn default_shares_per_trade() -> f64 { 100.0 }
fn default_stop_atr() -> f64 { 1.8 }
fn default_target_atr() -> f64 { 0.9 }
fn default_trailing_atr() -> f64 { 2.4 }
fn default_partial_exit_pct() -> f64 { 75.0 }
fn default_breakeven_trigger() -> Option<f64> { Some(0.8) }
fn default_breakeven_offset() -> f64 { 0.01 }
fn default_max_bars_in_trade() -> u32 { 720 }
fn default_period_14() -> usize { 14 }
fn default_min_adx() -> f64 { 20.0 }
fn default_min_atr_pct() -> f64 { 0.002 }
fn default_bb_period() -> usize { 20 }
fn default_bb_mult() -> f64 { 2.0 }
fn default_min_bb_width() -> f64 { 0.0012 }
fn default_rsi_threshold() -> f64 { 50.0 }
fn default_macd_fast() -> usize { 12 }
fn default_macd_slow() -> usize { 26 }
fn default_macd_signal() -> usize { 9 }
fn default_macd_hist_tolerance() -> f64 { -0.5 }
fn default_min_confirmations() -> usize { 2 }
fn default_volume_sma_period() -> usize { 20 }
fn default_volume_mult() -> f64 { 1.1 }
fn default_vwap_dev_atr() -> f64 { 0.15 }
fn default_true() -> bool { true }
fn default_pullback_ema() -> usize { 20 }
fn default_donchian_period() -> usize { 28 }
fn default_ut_key_value() -> f64 { 3.0 }
fn default_ut_atr_period() -> usize { 10 }
fn default_vwap_timezone() -> String { "America/New_York".to_string() }

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            shares_per_trade: default_shares_per_trade(),
            stop_atr_multiple: default_stop_atr(),
            target_atr_multiple: default_target_atr(),
            trailing_atr_multiple: default_trailing_atr(),
            partial_exit_pct: default_partial_exit_pct(),
            breakeven_trigger_atr: default_breakeven_trigger(),
            breakeven_offset: default_breakeven_offset(),
            max_bars_in_trade: default_max_bars_in_trade(),
            atr_period: default_period_14(),
            adx_period: default_period_14(),
            min_adx: default_min_adx(),
            min_atr_pct: default_min_atr_pct(),
            bb_period: default_bb_period(),
            bb_mult: default_bb_mult(),
            min_bb_width: default_min_bb_width(),
            rsi_period: default_period_14(),
            rsi_threshold: default_rsi_threshold(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            macd_hist_tolerance: default_macd_hist_tolerance(),
            use_volume_confirm: false,
            volume_sma_period: default_volume_sma_period(),
            volume_mult: default_volume_mult(),
            min_confirmations: default_min_confirmations(),
            use_ut_filter: false,
            cooldown_bars: 0,
            enable_pullback: default_true(),
            pullback_ema_period: default_pullback_ema(),
            pullback_min_atr: 0.0,
            enable_vwap_filter: false,
            vwap_dev_atr: default_vwap_dev_atr(),
            enable_breakout: default_true(),
            donchian_period: default_donchian_period(),
            enable_ut_cross: default_true(),
            ut_key_value: default_ut_key_value(),
            ut_atr_period: default_ut_atr_period(),
            vwap_timezone: default_vwap_timezone(),
        }
    }
}

impl StrategyParams {
    /// Reject parameter sets the pipeline or the lifecycle cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lengths = [
            ("atr_period", self.atr_period),
            ("adx_period", self.adx_period),
            ("bb_period", self.bb_period),
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("volume_sma_period", self.volume_sma_period),
            ("pullback_ema_period", self.pullback_ema_period),
            ("donchian_period", self.donchian_period),
            ("ut_atr_period", self.ut_atr_period),
        ];
        if let Some((name, _)) = lengths.iter().find(|(_, len)| *len == 0) {
            return Err(ConfigError::ZeroLength { name: *name });
        }

        let positives = [
            ("shares_per_trade", self.shares_per_trade),
            ("stop_atr_multiple", self.stop_atr_multiple),
            ("target_atr_multiple", self.target_atr_multiple),
            ("trailing_atr_multiple", self.trailing_atr_multiple),
            ("bb_mult", self.bb_mult),
            ("ut_key_value", self.ut_key_value),
            ("volume_mult", self.volume_mult),
        ];
        if let Some((name, value)) = positives.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(ConfigError::NonPositive {
                name: *name,
                value: *value,
            });
        }

        if !(self.partial_exit_pct > 0.0 && self.partial_exit_pct <= 100.0) {
            return Err(ConfigError::PartialPct(self.partial_exit_pct));
        }

        let non_negatives = [
            ("pullback_min_atr", self.pullback_min_atr),
            ("vwap_dev_atr", self.vwap_dev_atr),
        ];
        if let Some((name, value)) = non_negatives.iter().find(|(_, v)| !(*v >= 0.0)) {
            return Err(ConfigError::Negative {
                name: *name,
                value: *value,
            });
        }

        let available = self.available_confirmations();
        if self.min_confirmations > available {
            return Err(ConfigError::TooManyConfirmations {
                required: self.min_confirmations,
                available,
            });
        }

        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::MacdOrder {
                fast: self.macd_fast,
                slow: self.macd_slow,
            });
        }

        self.vwap_tz()?;
        Ok(())
    }

    /// Confirmations an entry can collect: RSI, MACD and optionally volume
    pub fn available_confirmations(&self) -> usize {
        2 + usize::from(self.use_volume_confirm)
    }

    /// Parsed VWAP session timezone
    pub fn vwap_tz(&self) -> Result<Tz, ConfigError> {
        self.vwap_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.vwap_timezone.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StrategyParams::default().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let params: StrategyParams =
            serde_json::from_str(r#"{ "shares_per_trade": 10, "min_adx": 25.0 }"#).unwrap();
        assert_eq!(params.shares_per_trade, 10.0);
        assert_eq!(params.min_adx, 25.0);
        assert_eq!(params.macd_hist_tolerance, -0.5);
        assert_eq!(params.breakeven_trigger_atr, Some(0.8));
    }

    #[test]
    fn test_null_breakeven_trigger_disables() {
        let params: StrategyParams =
            serde_json::from_str(r#"{ "breakeven_trigger_atr": null }"#).unwrap();
        assert_eq!(params.breakeven_trigger_atr, None);
    }

    #[test]
    fn test_rejects_zero_period() {
        let params = StrategyParams {
            rsi_period: 0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::ZeroLength { name: "rsi_period" })
        ));
    }

    #[test]
    fn test_rejects_bad_partial_pct() {
        let params = StrategyParams {
            partial_exit_pct: 120.0,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::PartialPct(_))));
    }

    #[test]
    fn test_rejects_unreachable_confirmations() {
        let params = StrategyParams {
            min_confirmations: 3,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::TooManyConfirmations {
                required: 3,
                available: 2
            })
        ));

        let params = StrategyParams {
            min_confirmations: 3,
            use_volume_confirm: true,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_pullback_depth() {
        let params = StrategyParams {
            pullback_min_atr: -0.5,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Negative {
                name: "pullback_min_atr",
                ..
            })
        ));
    }

    #[test]
    fn test_entry_filters_default_off() {
        let params = StrategyParams::default();
        assert!(!params.use_ut_filter);
        assert!(!params.use_volume_confirm);
        assert!(!params.enable_vwap_filter);
        assert_eq!(params.cooldown_bars, 0);
        assert_eq!(params.pullback_min_atr, 0.0);
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let params = StrategyParams {
            vwap_timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::UnknownTimezone(_))
        ));
    }
}

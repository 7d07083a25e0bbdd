//! UT Trend Strategy Implementation

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::indicators::TrendDirection;
use crate::pipeline::IndicatorSnapshot;
use crate::position::PositionManager;
use crate::strategies::Strategy;
use crate::{PositionStatus, SignalType, TradingSignal};

use super::config::StrategyParams;

/// Confidence contributed by each entry trigger
const CONFIDENCE_PER_TRIGGER: f64 = 0.3;
/// ADX value that alone yields full confidence
const CONFIDENCE_ADX_SCALE: f64 = 50.0;

/// UT Trend Strategy
pub struct UtTrendStrategy {
    params: StrategyParams,
}

impl UtTrendStrategy {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    /// Entry evaluation while flat
    fn evaluate_entry(
        &self,
        snapshots: &[IndicatorSnapshot],
        price: f64,
        timestamp: DateTime<Utc>,
        last_loss_exit: Option<DateTime<Utc>>,
    ) -> TradingSignal {
        let p = &self.params;
        let [.., prev, curr] = snapshots else {
            return TradingSignal::none(timestamp, price, "Insufficient history");
        };

        if let Some(exit_time) = last_loss_exit.filter(|_| p.cooldown_bars > 0) {
            let elapsed = snapshots
                .iter()
                .rev()
                .take_while(|s| s.timestamp > exit_time)
                .count();
            if elapsed < p.cooldown_bars as usize {
                debug!(elapsed, cooldown = p.cooldown_bars, "Cooling down after loss");
                return TradingSignal::none(timestamp, price, "Cooldown after loss");
            }
        }

        let (Some(adx), Some(atr), Some(atr_pct), Some(bb_width)) =
            (curr.adx, curr.atr, curr.atr_pct, curr.bb_width)
        else {
            return TradingSignal::none(timestamp, price, "Regime indicators undefined");
        };

        if adx < p.min_adx || atr_pct < p.min_atr_pct || bb_width < p.min_bb_width {
            debug!(adx, atr_pct, bb_width, "Regime filter rejected entry");
            return TradingSignal::none(timestamp, price, "Regime filter");
        }

        if p.use_ut_filter && curr.ut_direction != TrendDirection::Long {
            return TradingSignal::none(timestamp, price, "UT direction not long");
        }

        let confirmations = self.count_confirmations(curr);
        if confirmations < p.min_confirmations {
            debug!(confirmations, required = p.min_confirmations, "Not enough confirmations");
            return TradingSignal::none(timestamp, price, "Insufficient confirmations");
        }

        let triggers = self.entry_triggers(prev, curr);
        if triggers.is_empty() {
            return TradingSignal::none(timestamp, price, "No entry trigger");
        }

        let confidence = entry_confidence(triggers.len(), adx);
        let stop_loss = price - p.stop_atr_multiple * atr;
        let take_profit = price + p.target_atr_multiple * atr;
        let reason = format!("Entry: {}", triggers.join(" + "));

        info!(
            price,
            adx,
            atr,
            confidence,
            stop_loss,
            take_profit,
            reason = %reason,
            "BUY signal"
        );

        TradingSignal::buy(
            timestamp,
            price,
            p.shares_per_trade,
            reason,
            confidence,
            stop_loss,
            take_profit,
        )
    }

    fn count_confirmations(&self, snap: &IndicatorSnapshot) -> usize {
        let rsi_ok = snap.rsi.is_some_and(|rsi| rsi > self.params.rsi_threshold);
        let macd_ok = snap
            .macd_hist
            .is_some_and(|hist| hist > self.params.macd_hist_tolerance);
        let volume_ok = self.params.use_volume_confirm
            && snap
                .volume_sma
                .is_some_and(|avg| snap.volume >= avg * self.params.volume_mult);
        usize::from(rsi_ok) + usize::from(macd_ok) + usize::from(volume_ok)
    }

    /// Depth of the dip below the EMA on the bar before the cross
    fn pullback_deep_enough(&self, prev: &IndicatorSnapshot) -> bool {
        let min_depth = self.params.pullback_min_atr;
        if min_depth <= 0.0 {
            return true;
        }
        match (prev.ema_pullback, prev.atr) {
            (Some(ema), Some(atr)) if atr > 0.0 => (ema - prev.low) / atr >= min_depth,
            _ => false,
        }
    }

    /// Close back above VWAP after the low dipped under it
    fn vwap_reclaimed(&self, curr: &IndicatorSnapshot) -> bool {
        if !self.params.enable_vwap_filter {
            return true;
        }
        match (curr.vwap, curr.atr) {
            (Some(vwap), Some(atr)) if atr > 0.0 => {
                curr.close > vwap && (vwap - curr.low) / atr >= self.params.vwap_dev_atr
            }
            _ => false,
        }
    }

    /// Names of the entry triggers firing on the last two bars
    fn entry_triggers(
        &self,
        prev: &IndicatorSnapshot,
        curr: &IndicatorSnapshot,
    ) -> Vec<&'static str> {
        let p = &self.params;
        let mut triggers = Vec::new();

        if p.enable_pullback
            && crossed_above(prev.close, prev.ema_pullback, curr.close, curr.ema_pullback)
            && self.pullback_deep_enough(prev)
            && self.vwap_reclaimed(curr)
        {
            triggers.push("Pullback");
        }

        if p.enable_breakout && prev.donchian_high.is_some_and(|high| curr.close > high) {
            triggers.push("Breakout");
        }

        if p.enable_ut_cross && crossed_above(prev.close, prev.ut_stop, curr.close, curr.ut_stop) {
            triggers.push("UT Cross");
        }

        triggers
    }

    /// Exit evaluation while a position is open
    fn evaluate_exit(
        &self,
        snapshots: &[IndicatorSnapshot],
        price: f64,
        timestamp: DateTime<Utc>,
        positions: &mut PositionManager,
    ) -> TradingSignal {
        let p = &self.params;

        // Refresh runs every cycle, whether or not a signal follows
        let Some(position) = positions.mark_to_market(price).cloned() else {
            return TradingSignal::none(timestamp, price, "No position");
        };

        if price <= position.stop_loss {
            info!(price, stop_loss = position.stop_loss, "Stop loss hit");
            return TradingSignal::exit(
                SignalType::Sell,
                timestamp,
                price,
                position.quantity,
                "Stop Loss",
            );
        }

        let mut first_target_hit = position.first_target_hit;
        if price >= position.take_profit
            && !first_target_hit
            && position.status == PositionStatus::Long
        {
            let quantity = (position.quantity * p.partial_exit_pct / 100.0)
                .floor()
                .min(position.quantity);
            info!(price, take_profit = position.take_profit, quantity, "First target hit");
            if quantity > 0.0 {
                return TradingSignal::exit(
                    SignalType::PartialSell,
                    timestamp,
                    price,
                    quantity,
                    "Partial Take Profit",
                );
            }
            // Nothing left to sell at this size: keep the position and trail it
            first_target_hit = positions.mark_first_target();
        }

        if let Some(atr) = snapshots.last().and_then(|s| s.atr) {
            if first_target_hit {
                positions.ratchet_stop(price - p.trailing_atr_multiple * atr);
            } else if let Some(trigger) = p.breakeven_trigger_atr {
                if price >= position.entry_price + trigger * atr {
                    positions.ratchet_stop(position.entry_price + p.breakeven_offset);
                }
            }
        }

        if position.bars_in_trade >= p.max_bars_in_trade {
            info!(bars_in_trade = position.bars_in_trade, "Max time in trade reached");
            return TradingSignal::exit(
                SignalType::Sell,
                timestamp,
                price,
                position.quantity,
                "Max Time in Trade",
            );
        }

        TradingSignal::none(timestamp, price, "Holding")
    }
}

/// `prev` at or below its level and `curr` strictly above its level
fn crossed_above(prev: f64, prev_level: Option<f64>, curr: f64, curr_level: Option<f64>) -> bool {
    match (prev_level, curr_level) {
        (Some(prev_level), Some(curr_level)) => prev <= prev_level && curr > curr_level,
        _ => false,
    }
}

/// `min(1, 0.3 x triggers + ADX / 50)`
pub(crate) fn entry_confidence(triggers: usize, adx: f64) -> f64 {
    (CONFIDENCE_PER_TRIGGER * triggers as f64 + adx / CONFIDENCE_ADX_SCALE).min(1.0)
}

impl Strategy for UtTrendStrategy {
    fn name(&self) -> &'static str {
        super::NAME
    }

    fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn generate_signal(
        &self,
        snapshots: &[IndicatorSnapshot],
        price: f64,
        timestamp: DateTime<Utc>,
        positions: &mut PositionManager,
    ) -> TradingSignal {
        if positions.is_flat() {
            self.evaluate_entry(snapshots, price, timestamp, positions.last_loss_exit())
        } else {
            self.evaluate_exit(snapshots, price, timestamp, positions)
        }
    }

    fn init(&mut self) {
        info!(
            shares = self.params.shares_per_trade,
            stop_atr = self.params.stop_atr_multiple,
            target_atr = self.params.target_atr_multiple,
            trail_atr = self.params.trailing_atr_multiple,
            "UT trend strategy initialized"
        );
    }
}

//! Position lifecycle management
//!
//! [`PositionManager`] exclusively owns the session's single position and
//! applies executed signals to it:
//!
//! ```text
//! FLAT --BUY--> LONG --PARTIAL_SELL--> PARTIAL
//!                 |                       |
//!                 +---------SELL----------+--> FLAT
//! ```
//!
//! Invalid applications (a BUY while a position is open, a PARTIAL_SELL while
//! flat, re-applying a SELL) are expected races with execution timing and are
//! reported as `false` rather than errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{ExecutedSignal, Position, PositionStatus, SignalType};

/// Read-only view of the position for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub status: PositionStatus,
    pub entry_time: Option<DateTime<Utc>>,
    pub entry_price: Option<f64>,
    pub current_price: Option<f64>,
    pub initial_quantity: f64,
    pub quantity: f64,
    pub unrealized_pnl: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub bars_in_trade: u32,
    pub first_target_hit: bool,
    pub highest_price: Option<f64>,
}

impl PositionSummary {
    fn flat() -> Self {
        Self {
            status: PositionStatus::Flat,
            entry_time: None,
            entry_price: None,
            current_price: None,
            initial_quantity: 0.0,
            quantity: 0.0,
            unrealized_pnl: 0.0,
            stop_loss: None,
            take_profit: None,
            bars_in_trade: 0,
            first_target_hit: false,
            highest_price: None,
        }
    }
}

/// Realized results of closed and partially closed trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedStats {
    pub realized_pnl: f64,
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

impl RealizedStats {
    pub fn win_rate(&self) -> f64 {
        if self.closed_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.closed_trades as f64
        }
    }
}

/// Owner of the session's position
#[derive(Debug, Clone)]
pub struct PositionManager {
    position: Option<Position>,
    breakeven_offset: f64,
    /// Realized P&L of the open trade so far (partials included)
    trade_pnl: f64,
    stats: RealizedStats,
    /// Timestamp of the most recent losing close
    last_loss_exit: Option<DateTime<Utc>>,
}

impl PositionManager {
    /// Create a flat manager. `breakeven_offset` is added to the entry price
    /// when the stop is moved to breakeven.
    pub fn new(breakeven_offset: f64) -> Self {
        Self {
            position: None,
            breakeven_offset,
            trade_pnl: 0.0,
            stats: RealizedStats::default(),
            last_loss_exit: None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn status(&self) -> PositionStatus {
        self.position
            .as_ref()
            .map(|p| p.status)
            .unwrap_or(PositionStatus::Flat)
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn stats(&self) -> &RealizedStats {
        &self.stats
    }

    pub fn last_loss_exit(&self) -> Option<DateTime<Utc>> {
        self.last_loss_exit
    }

    /// Apply an executed signal. Returns `false` without mutating anything
    /// when the transition is not valid from the current state.
    pub fn apply(&mut self, fill: &ExecutedSignal) -> bool {
        if !(fill.fill_price.is_finite() && fill.fill_price > 0.0)
            || !(fill.fill_quantity.is_finite() && fill.fill_quantity > 0.0)
        {
            warn!(
                signal = %fill.signal.signal_type,
                price = fill.fill_price,
                quantity = fill.fill_quantity,
                "Ignoring fill with invalid price or quantity"
            );
            return false;
        }

        let applied = match fill.signal.signal_type {
            SignalType::Buy => self.open(fill),
            SignalType::PartialSell => self.reduce(fill),
            SignalType::Sell => self.close(fill),
            SignalType::None => false,
        };

        if !applied {
            debug!(
                signal = %fill.signal.signal_type,
                status = ?self.status(),
                "Fill not applicable in current position state"
            );
        }
        applied
    }

    fn open(&mut self, fill: &ExecutedSignal) -> bool {
        if self.position.is_some() {
            return false;
        }
        let signal = &fill.signal;
        let (Some(stop), Some(target)) = (signal.stop_loss, signal.take_profit) else {
            warn!("BUY signal without protective levels, not opening position");
            return false;
        };

        // Keep the signal's ATR distances, anchored at the actual fill
        let stop_loss = fill.fill_price - (signal.price - stop);
        let take_profit = fill.fill_price + (target - signal.price);

        self.trade_pnl = 0.0;
        self.position = Some(Position {
            status: PositionStatus::Long,
            entry_time: fill.timestamp,
            entry_price: fill.fill_price,
            initial_quantity: fill.fill_quantity,
            quantity: fill.fill_quantity,
            current_price: fill.fill_price,
            unrealized_pnl: 0.0,
            stop_loss,
            take_profit,
            first_target_hit: false,
            bars_in_trade: 0,
            highest_price: fill.fill_price,
        });

        info!(
            price = fill.fill_price,
            quantity = fill.fill_quantity,
            stop_loss,
            take_profit,
            "Position opened"
        );
        true
    }

    fn reduce(&mut self, fill: &ExecutedSignal) -> bool {
        let Some(position) = self.position.as_mut() else {
            return false;
        };
        if position.status != PositionStatus::Long {
            return false;
        }

        if fill.fill_quantity >= position.quantity {
            return self.close(fill);
        }

        let pnl = (fill.fill_price - position.entry_price) * fill.fill_quantity;
        self.trade_pnl += pnl;
        self.stats.realized_pnl += pnl;

        position.quantity -= fill.fill_quantity;
        position.status = PositionStatus::Partial;
        first_target_reached(position, self.breakeven_offset);
        position.unrealized_pnl = position.unrealized_pnl_at(position.current_price);

        info!(
            price = fill.fill_price,
            sold = fill.fill_quantity,
            remaining = position.quantity,
            stop_loss = position.stop_loss,
            pnl,
            "Partial exit"
        );
        true
    }

    fn close(&mut self, fill: &ExecutedSignal) -> bool {
        let Some(position) = self.position.take() else {
            return false;
        };

        let pnl = (fill.fill_price - position.entry_price) * position.quantity;
        self.trade_pnl += pnl;
        self.stats.realized_pnl += pnl;
        self.stats.closed_trades += 1;
        if self.trade_pnl > 0.0 {
            self.stats.winning_trades += 1;
        } else {
            self.stats.losing_trades += 1;
        }
        if self.trade_pnl < 0.0 {
            self.last_loss_exit = Some(fill.timestamp);
        }

        info!(
            price = fill.fill_price,
            quantity = position.quantity,
            trade_pnl = self.trade_pnl,
            bars_in_trade = position.bars_in_trade,
            reason = %fill.signal.reason,
            "Position closed"
        );
        self.trade_pnl = 0.0;
        true
    }

    /// Refresh price, unrealized P&L and the bars-in-trade counter.
    /// Runs on every evaluation cycle while a position is open.
    pub fn mark_to_market(&mut self, price: f64) -> Option<&Position> {
        let position = self.position.as_mut()?;
        position.current_price = price;
        position.unrealized_pnl = position.unrealized_pnl_at(price);
        position.bars_in_trade += 1;
        position.highest_price = position.highest_price.max(price);
        Some(position)
    }

    /// Count bars that arrived without their own evaluation cycle
    pub fn skip_bars(&mut self, bars: u32) {
        if let Some(position) = self.position.as_mut() {
            position.bars_in_trade += bars;
        }
    }

    /// Record the first target without selling: the partial quantity
    /// rounded down to nothing. The stop moves to breakeven and the
    /// trailing stop takes over.
    pub fn mark_first_target(&mut self) -> bool {
        match self.position.as_mut() {
            Some(position) if !position.first_target_hit => {
                first_target_reached(position, self.breakeven_offset);
                info!(stop_loss = position.stop_loss, "First target reached without partial");
                true
            }
            _ => false,
        }
    }

    /// Raise the stop to `level`. Never lowers it; returns whether it moved.
    pub fn ratchet_stop(&mut self, level: f64) -> bool {
        match self.position.as_mut() {
            Some(position) if level.is_finite() && level > position.stop_loss => {
                debug!(from = position.stop_loss, to = level, "Stop raised");
                position.stop_loss = level;
                true
            }
            _ => false,
        }
    }

    pub fn summary(&self) -> PositionSummary {
        match &self.position {
            None => PositionSummary::flat(),
            Some(p) => PositionSummary {
                status: p.status,
                entry_time: Some(p.entry_time),
                entry_price: Some(p.entry_price),
                current_price: Some(p.current_price),
                initial_quantity: p.initial_quantity,
                quantity: p.quantity,
                unrealized_pnl: p.unrealized_pnl,
                stop_loss: Some(p.stop_loss),
                take_profit: Some(p.take_profit),
                bars_in_trade: p.bars_in_trade,
                first_target_hit: p.first_target_hit,
                highest_price: Some(p.highest_price),
            },
        }
    }
}

fn first_target_reached(position: &mut Position, breakeven_offset: f64) {
    position.first_target_hit = true;
    position.stop_loss = position
        .stop_loss
        .max(position.entry_price + breakeven_offset);
}

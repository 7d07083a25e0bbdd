//! CSV trade journal
//!
//! One row per applied fill, appended to `{dir}/{prefix}_trades_{YYYY-MM-DD}.csv`.
//! Files rotate on the fill's UTC date and the header is written once per file.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::JournalConfig;
use crate::types::{ExecutedSignal, PositionStatus};

/// One journal row
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub ts_utc: String,
    pub ts_local: String,
    pub session_id: String,
    pub symbol: String,
    pub side: String,
    pub qty: f64,
    pub price: f64,
    pub reason: String,
    pub pnl_realized: f64,
    pub position_after: PositionStatus,
}

/// Appending CSV journal with daily files
pub struct TradeJournal {
    dir: PathBuf,
    prefix: String,
    session_id: String,
    symbol: String,
    tz: Tz,
    writer: Option<(NaiveDate, csv::Writer<File>)>,
}

impl TradeJournal {
    pub fn new(
        dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        symbol: impl Into<String>,
        tz: Tz,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create journal dir {}", dir.display()))?;

        Ok(Self {
            dir,
            prefix: prefix.into(),
            session_id: Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
            symbol: symbol.into(),
            tz,
            writer: None,
        })
    }

    pub fn from_config(config: &JournalConfig, symbol: &str, tz: Tz) -> Result<Self> {
        Self::new(&config.dir, config.prefix.clone(), symbol, tz)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Journal file for a given date
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}_trades_{}.csv",
            self.prefix,
            date.format("%Y-%m-%d")
        ))
    }

    /// Append a row for an applied fill
    pub fn record(
        &mut self,
        fill: &ExecutedSignal,
        pnl_realized: f64,
        position_after: PositionStatus,
    ) -> Result<()> {
        let row = TradeRecord {
            ts_utc: fill.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ts_local: self.local_time(fill.timestamp),
            session_id: self.session_id.clone(),
            symbol: self.symbol.clone(),
            side: fill.signal.signal_type.to_string(),
            qty: fill.fill_quantity,
            price: fill.fill_price,
            reason: fill.signal.reason.clone(),
            pnl_realized,
            position_after,
        };

        let writer = self.writer_for(fill.timestamp.date_naive())?;
        writer.serialize(&row).context("Failed to write journal row")?;
        writer.flush().context("Failed to flush journal")?;
        Ok(())
    }

    fn local_time(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
    }

    fn writer_for(&mut self, date: NaiveDate) -> Result<&mut csv::Writer<File>> {
        let stale = !matches!(&self.writer, Some((current, _)) if *current == date);
        if stale {
            let path = self.path_for(date);
            let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open journal {}", path.display()))?;
            debug!(path = %path.display(), needs_header, "Journal file opened");

            let writer = csv::WriterBuilder::new()
                .has_headers(needs_header)
                .from_writer(file);
            self.writer = Some((date, writer));
        }

        self.writer
            .as_mut()
            .map(|(_, writer)| writer)
            .context("Journal writer unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalType, TradingSignal};
    use chrono::TimeZone;

    fn tmp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tse_journal_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn fill(day: u32, kind: SignalType) -> ExecutedSignal {
        let ts = Utc.with_ymd_and_hms(2025, 7, day, 15, 0, 0).unwrap();
        let signal = match kind {
            SignalType::Buy => TradingSignal::buy(ts, 100.0, 10.0, "Entry: Breakout", 0.7, 98.0, 101.0),
            _ => TradingSignal::exit(kind, ts, 101.0, 10.0, "Max Time in Trade"),
        };
        ExecutedSignal::at_signal(signal)
    }

    #[test]
    fn test_header_written_once() {
        let dir = tmp_dir("header");
        let mut journal = TradeJournal::new(&dir, "test", "SPY", chrono_tz::America::New_York).unwrap();
        journal.record(&fill(1, SignalType::Buy), 0.0, PositionStatus::Long).unwrap();
        journal.record(&fill(1, SignalType::Sell), 10.0, PositionStatus::Flat).unwrap();

        // A second journal on the same file keeps appending without a header
        let mut again = TradeJournal::new(&dir, "test", "SPY", chrono_tz::America::New_York).unwrap();
        again.record(&fill(1, SignalType::Buy), 0.0, PositionStatus::Long).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let contents = fs::read_to_string(journal.path_for(date)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ts_utc,ts_local,session_id"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("ts_utc")).count(), 1);
        assert!(lines[1].contains("2025-07-01 11:00:00 EDT"));
        assert!(lines[2].contains("SELL"));
        assert!(lines[2].ends_with("FLAT"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rotates_by_date() {
        let dir = tmp_dir("rotate");
        let mut journal = TradeJournal::new(&dir, "test", "SPY", chrono_tz::UTC).unwrap();
        journal.record(&fill(1, SignalType::Buy), 0.0, PositionStatus::Long).unwrap();
        journal.record(&fill(2, SignalType::Sell), 10.0, PositionStatus::Flat).unwrap();

        for day in [1, 2] {
            let date = NaiveDate::from_ymd_opt(2025, 7, day).unwrap();
            let contents = fs::read_to_string(journal.path_for(date)).unwrap();
            assert_eq!(contents.lines().count(), 2);
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}

//! Bar feed loading
//!
//! Reads OHLCV bars from CSV files with a `datetime,open,high,low,close,volume`
//! layout. Rows are parsed but not validated; validation happens when bars
//! enter a session so a bad row can be skipped for that cycle only.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::info;

use crate::Bar;

/// Load OHLCV data from CSV file
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let timestamp = parse_timestamp(dt_str)
            .with_context(|| format!("Failed to parse datetime: {}", dt_str))?;

        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column", name))?
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Failed to parse {} on row {}", name, row_idx + 1))
        };

        bars.push(Bar::new_unchecked(
            timestamp,
            field(1, "open")?,
            field(2, "high")?,
            field(3, "low")?,
            field(4, "close")?,
            field(5, "volume")?,
        ));
    }

    info!(bars = bars.len(), path = %path.display(), "Loaded bar feed");
    Ok(bars)
}

/// RFC 3339, or naive `%Y-%m-%d %H:%M:%S` taken as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = raw.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn write_tmp(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("tse_data_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_csv_both_timestamp_formats() {
        let path = write_tmp(
            "bars.csv",
            "datetime,open,high,low,close,volume\n\
             2025-01-02T14:30:00Z,100.0,101.0,99.5,100.5,1200\n\
             2025-01-02 14:31:00,100.5,102.0,100.0,101.5,900\n",
        );

        let bars = load_csv(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[1].timestamp,
            Utc.with_ymd_and_hms(2025, 1, 2, 14, 31, 0).unwrap()
        );
        assert_eq!(bars[1].close, 101.5);
        assert_eq!(bars[0].volume, 1200.0);
    }

    #[test]
    fn test_load_csv_bad_number() {
        let path = write_tmp(
            "bad.csv",
            "datetime,open,high,low,close,volume\n\
             2025-01-02T14:30:00Z,100.0,abc,99.5,100.5,1200\n",
        );
        let err = load_csv(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("high"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_csv("/nonexistent/bars.csv").is_err());
    }
}

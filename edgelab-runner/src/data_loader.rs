//! CSV bar ingestion.
//!
//! Accepts the common OHLCV layout: a header row, one bar per record,
//! timestamps as either RFC 3339 or a bare `YYYY-MM-DD` date (taken as
//! midnight UTC). Ordering and per-bar sanity are the engine's concern;
//! the loader only parses.

use std::path::Path;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

use edgelab_core::domain::Bar;

/// Errors from bar loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("record {record}: unparseable timestamp '{value}'")]
    Timestamp { record: usize, value: String },
    #[error("no bars in '{0}'")]
    Empty(String),
}

#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "date", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load bars from a CSV file.
pub fn load_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for (index, record) in reader.deserialize::<BarRecord>().enumerate() {
        let record = record?;
        let timestamp =
            parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
                record: index + 1,
                value: record.timestamp.clone(),
            })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    if bars.is_empty() {
        return Err(LoadError::Empty(path.display().to_string()));
    }
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

//! Canonical OHLCV bar.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;

/// Open/high/low/close/volume candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Canonical symbol.
    pub symbol: String,
    /// Bar timeframe.
    pub timeframe: Timeframe,
    /// Bar open time.
    pub timestamp: DateTime<Utc>,
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Close.
    pub close: Decimal,
    /// Volume.
    pub volume: Decimal,
}

/// Parse a broker bar time.
///
/// Accepts RFC 3339, `YYYYMMDD HH:MM:SS`, `YYYYMMDD` and epoch seconds.
/// Naive forms are taken as UTC.
#[must_use]
pub fn parse_bar_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y%m%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    // an 8-digit number is a date, not an epoch
    if raw.len() == 8
        && let Ok(date) = NaiveDate::parse_from_str(raw, "%Y%m%d")
    {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339() {
        let t = parse_bar_time("2024-03-01T14:30:00Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap());
    }

    #[test]
    fn parses_broker_datetime() {
        let t = parse_bar_time("20240301 14:30:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap());
    }

    #[test]
    fn parses_date_only() {
        let t = parse_bar_time("20240301").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_epoch_seconds() {
        let t = parse_bar_time("1709303400").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_bar_time("").is_none());
        assert!(parse_bar_time("yesterday").is_none());
    }
}

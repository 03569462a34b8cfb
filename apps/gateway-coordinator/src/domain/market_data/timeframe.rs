//! Bar timeframes and the two tables that drive collection: the lookback
//! window requested from the broker and the minimum refresh interval used
//! for staleness checks.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Coarse grouping of timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeframeScale {
    /// Below one hour.
    SubHour,
    /// One hour up to, but excluding, a day.
    Hour,
    /// Daily.
    Day,
}

/// Bar timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// One minute.
    #[serde(rename = "1min")]
    OneMinute,
    /// Five minutes.
    #[serde(rename = "5min")]
    FiveMinutes,
    /// Fifteen minutes.
    #[serde(rename = "15min")]
    FifteenMinutes,
    /// Thirty minutes.
    #[serde(rename = "30min")]
    ThirtyMinutes,
    /// One hour.
    #[serde(rename = "1hour")]
    OneHour,
    /// Four hours.
    #[serde(rename = "4hour")]
    FourHours,
    /// One day.
    #[serde(rename = "1day")]
    OneDay,
}

impl Timeframe {
    /// Every supported timeframe, shortest first.
    pub const ALL: [Self; 7] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
    ];

    /// Token used in storage and broker requests.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::ThirtyMinutes => "30min",
            Self::OneHour => "1hour",
            Self::FourHours => "4hour",
            Self::OneDay => "1day",
        }
    }

    /// Scale grouping.
    #[must_use]
    pub const fn scale(&self) -> TimeframeScale {
        match self {
            Self::OneMinute | Self::FiveMinutes | Self::FifteenMinutes | Self::ThirtyMinutes => {
                TimeframeScale::SubHour
            }
            Self::OneHour | Self::FourHours => TimeframeScale::Hour,
            Self::OneDay => TimeframeScale::Day,
        }
    }

    /// History period requested from the broker.
    #[must_use]
    pub const fn lookback_period(&self) -> &'static str {
        match self.scale() {
            TimeframeScale::SubHour => "1M",
            TimeframeScale::Hour => "3M",
            TimeframeScale::Day => "1Y",
        }
    }

    /// Minimum age of the newest stored bar before a refresh is due.
    #[must_use]
    pub const fn refresh_interval_minutes(&self) -> i64 {
        match self.scale() {
            TimeframeScale::SubHour => 5,
            TimeframeScale::Hour => 60,
            TimeframeScale::Day => 1440,
        }
    }

    /// [`Self::refresh_interval_minutes`] as a duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::minutes(self.refresh_interval_minutes())
    }

    /// Broker-native bar size string.
    #[must_use]
    pub const fn bar_size(&self) -> &'static str {
        match self {
            Self::OneMinute => "1 min",
            Self::FiveMinutes => "5 mins",
            Self::FifteenMinutes => "15 mins",
            Self::ThirtyMinutes => "30 mins",
            Self::OneHour => "1 hour",
            Self::FourHours => "4 hours",
            Self::OneDay => "1 day",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Timeframe::OneMinute, "1M", 5 ; "one minute")]
    #[test_case(Timeframe::FiveMinutes, "1M", 5 ; "five minutes")]
    #[test_case(Timeframe::FifteenMinutes, "1M", 5 ; "fifteen minutes")]
    #[test_case(Timeframe::ThirtyMinutes, "1M", 5 ; "thirty minutes")]
    #[test_case(Timeframe::OneHour, "3M", 60 ; "one hour")]
    #[test_case(Timeframe::FourHours, "3M", 60 ; "four hours")]
    #[test_case(Timeframe::OneDay, "1Y", 1440 ; "one day")]
    fn lookback_and_refresh(tf: Timeframe, lookback: &str, refresh_minutes: i64) {
        assert_eq!(tf.lookback_period(), lookback);
        assert_eq!(tf.refresh_interval_minutes(), refresh_minutes);
    }

    #[test]
    fn parses_every_token() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("2hour".parse::<Timeframe>().is_err());
    }

    #[test]
    fn serde_uses_tokens() {
        assert_eq!(serde_json::to_string(&Timeframe::OneHour).unwrap(), "\"1hour\"");
        let tf: Timeframe = serde_json::from_str("\"15min\"").unwrap();
        assert_eq!(tf, Timeframe::FifteenMinutes);
    }
}

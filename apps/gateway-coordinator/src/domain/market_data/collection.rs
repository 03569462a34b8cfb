//! Results of collection runs. Ephemeral; never persisted.

use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;
use crate::domain::shared::SetupId;

/// Outcome for one symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResult {
    /// Canonical symbol.
    pub symbol: String,
    /// Timeframe collected.
    pub timeframe: Timeframe,
    /// Whether the step succeeded.
    pub success: bool,
    /// Bars newly stored.
    pub records_collected: usize,
    /// Failure reason.
    pub error: Option<String>,
    /// Informational note (e.g. "up to date").
    pub note: Option<String>,
}

impl CollectionResult {
    /// Stored data is fresh; nothing fetched.
    #[must_use]
    pub fn up_to_date(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            success: true,
            records_collected: 0,
            error: None,
            note: Some("up to date".to_string()),
        }
    }

    /// Bars fetched and stored.
    #[must_use]
    pub fn collected(symbol: impl Into<String>, timeframe: Timeframe, records: usize) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            success: true,
            records_collected: records,
            error: None,
            note: None,
        }
    }

    /// Step failed.
    #[must_use]
    pub fn failed(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        error: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            success: false,
            records_collected: 0,
            error: Some(error.into()),
            note: None,
        }
    }
}

/// Aggregate over a collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Setups visited.
    pub setups_processed: usize,
    /// Setups that could not be processed at all.
    pub setups_failed: usize,
    /// Timeframe steps attempted.
    pub total: usize,
    /// Successful steps.
    pub successful: usize,
    /// Failed steps.
    pub failed: usize,
    /// Bars newly stored.
    pub records_collected: usize,
    /// Setup-level failures.
    pub errors: Vec<String>,
    /// Per-step results.
    pub results: Vec<CollectionResult>,
}

impl CollectionStats {
    /// Count one step.
    pub fn record(&mut self, result: CollectionResult) {
        self.total += 1;
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.records_collected += result.records_collected;
        self.results.push(result);
    }

    /// Count a setup that could not be processed.
    pub fn record_setup_failure(&mut self, setup_id: SetupId, error: impl Into<String>) {
        self.setups_processed += 1;
        self.setups_failed += 1;
        self.errors.push(format!("setup {setup_id}: {}", error.into()));
    }

    /// Fold a per-setup summary into this one.
    pub fn merge(&mut self, other: Self) {
        self.setups_processed += other.setups_processed;
        self.setups_failed += other.setups_failed;
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
        self.records_collected += other.records_collected;
        self.errors.extend(other.errors);
        self.results.extend(other.results);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_success_and_failure() {
        let mut stats = CollectionStats::default();
        stats.record(CollectionResult::collected("AAPL", Timeframe::OneHour, 12));
        stats.record(CollectionResult::failed(
            "AAPL",
            Timeframe::OneDay,
            "no data received",
        ));
        stats.record(CollectionResult::up_to_date("AAPL", Timeframe::FiveMinutes));

        assert_eq!(stats.total, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.records_collected, 12);
    }

    #[test]
    fn merge_accumulates() {
        let mut a = CollectionStats {
            setups_processed: 1,
            ..CollectionStats::default()
        };
        a.record(CollectionResult::collected("A", Timeframe::OneDay, 1));
        let mut b = CollectionStats::default();
        b.record_setup_failure(SetupId::new(9), "boom");

        a.merge(b);
        assert_eq!(a.setups_processed, 2);
        assert_eq!(a.setups_failed, 1);
        assert_eq!(a.total, 1);
        assert_eq!(a.errors, vec!["setup 9: boom".to_string()]);
    }

    #[test]
    fn up_to_date_is_success_with_note() {
        let r = CollectionResult::up_to_date("MSFT", Timeframe::OneHour);
        assert!(r.success);
        assert_eq!(r.records_collected, 0);
        assert!(r.error.is_none());
        assert_eq!(r.note.as_deref(), Some("up to date"));
    }
}

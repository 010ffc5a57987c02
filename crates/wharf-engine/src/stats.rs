//! Counters and badge derived from the capture history.
//!
//! Day boundaries compare the `YYYY-MM-DD` prefix of the UTC ISO timestamp,
//! not the user's local calendar. A capture at 23:30 local time in UTC-5 counts
//! toward the next UTC day.

use crate::clock::Clock;
use crate::effects::EffectSink;
use crate::history::HistoryLedger;
use crate::store::StoreError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wharf_common::protocol::{BadgeState, Effect, HistoryRecord, Stats};

/// Days (including today) covered by the weekly counter.
pub const WEEK_DAYS: i64 = 7;

/// Default period of the background badge refresh.
pub const BADGE_REFRESH_PERIOD: std::time::Duration = std::time::Duration::from_secs(60 * 60);

fn day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Compute counters for `records` as of `now`. Duplicates count as failures.
pub fn compute_stats(records: &[HistoryRecord], now: DateTime<Utc>) -> Stats {
    let today = day_key(now);
    let week: Vec<String> = (0..WEEK_DAYS)
        .map(|offset| day_key(now - Duration::days(offset)))
        .collect();

    records.iter().fold(Stats::default(), |mut stats, record| {
        if record.is_success() {
            let day = day_key(record.captured_at);
            stats.total_count += 1;
            if day == today {
                stats.today_count += 1;
            }
            if week.contains(&day) {
                stats.week_count += 1;
            }
        } else {
            stats.failed_count += 1;
        }
        stats
    })
}

#[derive(Clone)]
pub struct StatsAggregator {
    ledger: HistoryLedger,
    clock: Arc<dyn Clock>,
    effects: Arc<dyn EffectSink>,
}

impl StatsAggregator {
    pub fn new(ledger: HistoryLedger, clock: Arc<dyn Clock>, effects: Arc<dyn EffectSink>) -> Self {
        Self {
            ledger,
            clock,
            effects,
        }
    }

    pub async fn stats(&self) -> Result<Stats, StoreError> {
        let records = self.ledger.list().await?;
        Ok(compute_stats(&records, self.clock.now()))
    }

    /// Badge reflecting today's successful captures, without emitting it.
    pub async fn badge_state(&self) -> Result<BadgeState, StoreError> {
        Ok(BadgeState::from_count(self.stats().await?.today_count))
    }

    /// Recompute the badge and hand it to the effect sink.
    pub async fn refresh_badge(&self) -> Result<BadgeState, StoreError> {
        let badge = self.badge_state().await?;
        debug!("Badge refreshed: '{}'", badge.text);
        self.effects.emit(Effect::Badge(badge.clone()));
        Ok(badge)
    }

    /// Refresh the badge every `period` so day rollover clears it without new activity.
    ///
    /// The first refresh happens immediately.
    pub fn spawn_refresh(&self, period: std::time::Duration) -> JoinHandle<()> {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = aggregator.refresh_badge().await {
                    warn!("Scheduled badge refresh failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wharf_common::protocol::{CaptureSource, Outcome};

    fn record(outcome: Outcome, at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            id: (outcome == Outcome::Success).then(|| "c".to_string()),
            name: "x".into(),
            source: CaptureSource::Extension,
            outcome,
            error: (outcome == Outcome::Failure).then(|| "HTTP 409".to_string()),
            captured_at: at,
        }
    }

    #[test]
    fn test_counts_by_day_and_outcome() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap();
        let mut records = Vec::new();
        for _ in 0..3 {
            records.push(record(Outcome::Success, now));
        }
        for _ in 0..2 {
            records.push(record(Outcome::Failure, now));
        }
        records.push(record(Outcome::Success, now - Duration::days(1)));
        records.push(record(Outcome::Success, now - Duration::days(7)));

        let stats = compute_stats(&records, now);
        assert_eq!(stats.today_count, 3);
        assert_eq!(stats.week_count, 4);
        assert_eq!(stats.total_count, 5);
        assert_eq!(stats.failed_count, 2);
    }

    #[test]
    fn test_day_boundary_is_utc_prefix() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 5, 0).unwrap();
        let late_yesterday = Utc.with_ymd_and_hms(2026, 10, 18, 23, 59, 59).unwrap();
        let stats = compute_stats(&[record(Outcome::Success, late_yesterday)], now);
        assert_eq!(stats.today_count, 0);
        assert_eq!(stats.week_count, 1);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(compute_stats(&[], Utc::now()), Stats::default());
    }
}

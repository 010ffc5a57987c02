//! Bounded, newest-first log of capture attempts.

use crate::clock::Clock;
use crate::store::{Store, StoreError};
use serde_json::Value;
use std::sync::Arc;
use wharf_common::protocol::{CaptureSource, HistoryRecord, Outcome};

pub const HISTORY_KEY: &str = "captureHistory";

/// Maximum number of records kept; older entries are evicted first.
pub const HISTORY_LIMIT: usize = 200;

/// A capture attempt about to be recorded. The timestamp is assigned on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Succeeded {
        id: Option<String>,
        name: String,
        source: CaptureSource,
    },
    Failed {
        name: String,
        source: CaptureSource,
        error: String,
    },
}

impl Attempt {
    fn into_record(self, captured_at: chrono::DateTime<chrono::Utc>) -> HistoryRecord {
        match self {
            Attempt::Succeeded { id, name, source } => HistoryRecord {
                id,
                name,
                source,
                outcome: Outcome::Success,
                error: None,
                captured_at,
            },
            Attempt::Failed {
                name,
                source,
                error,
            } => HistoryRecord {
                id: None,
                name,
                source,
                outcome: Outcome::Failure,
                error: Some(error),
                captured_at,
            },
        }
    }
}

#[derive(Clone)]
pub struct HistoryLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Prepend a record stamped with the current time, trimming to [`HISTORY_LIMIT`].
    pub async fn append(&self, attempt: Attempt) -> Result<HistoryRecord, StoreError> {
        let record = attempt.into_record(self.clock.now());
        let stored = record.clone();

        self.store
            .update(
                HISTORY_KEY,
                Box::new(move |current| {
                    let mut records = decode(current)?;
                    records.insert(0, stored);
                    records.truncate(HISTORY_LIMIT);
                    Ok(serde_json::to_value(records)?)
                }),
            )
            .await?;

        Ok(record)
    }

    /// All stored records, newest first.
    pub async fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut doc = self.store.get(&[HISTORY_KEY]).await?;
        decode(doc.remove(HISTORY_KEY))
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store
            .update(HISTORY_KEY, Box::new(|_| Ok(Value::Array(Vec::new()))))
            .await?;
        Ok(())
    }
}

fn decode(value: Option<Value>) -> Result<Vec<HistoryRecord>, StoreError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
            key: HISTORY_KEY.to_string(),
            detail: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn ledger() -> (HistoryLedger, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
        ));
        (
            HistoryLedger::new(Arc::new(MemoryStore::new()), clock.clone()),
            clock,
        )
    }

    fn success(n: usize) -> Attempt {
        Attempt::Succeeded {
            id: Some(format!("c{}", n)),
            name: format!("Candidate {}", n),
            source: CaptureSource::LinkedIn,
        }
    }

    #[tokio::test]
    async fn test_newest_first() {
        let (ledger, clock) = ledger();
        ledger.append(success(1)).await.unwrap();
        clock.advance(Duration::minutes(1));
        ledger
            .append(Attempt::Failed {
                name: "Grace".into(),
                source: CaptureSource::Gmail,
                error: "HTTP 500".into(),
            })
            .await
            .unwrap();

        let records = ledger.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Grace");
        assert_eq!(records[0].outcome, Outcome::Failure);
        assert_eq!(records[0].id, None);
        assert_eq!(records[0].error.as_deref(), Some("HTTP 500"));
        assert_eq!(records[1].id.as_deref(), Some("c1"));
        assert!(records[0].captured_at > records[1].captured_at);
    }

    #[tokio::test]
    async fn test_full_ledger_evicts_oldest() {
        let (ledger, _) = ledger();
        for n in 0..HISTORY_LIMIT {
            ledger.append(success(n)).await.unwrap();
        }
        assert_eq!(ledger.list().await.unwrap().len(), HISTORY_LIMIT);

        ledger.append(success(HISTORY_LIMIT)).await.unwrap();
        let records = ledger.list().await.unwrap();
        assert_eq!(records.len(), HISTORY_LIMIT);
        assert_eq!(records[0].id.as_deref(), Some("c200"));
        assert_eq!(records[HISTORY_LIMIT - 1].id.as_deref(), Some("c1"));
        assert!(records.iter().all(|r| r.id.as_deref() != Some("c0")));
    }

    #[tokio::test]
    async fn test_clear_empties() {
        let (ledger, _) = ledger();
        ledger.append(success(1)).await.unwrap();
        ledger.clear().await.unwrap();
        assert!(ledger.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_is_reported() {
        let mut doc = crate::store::Document::new();
        doc.insert(HISTORY_KEY.into(), serde_json::json!({ "not": "a list" }));
        let ledger = HistoryLedger::new(
            Arc::new(MemoryStore::with_document(doc)),
            Arc::new(crate::clock::SystemClock),
        );
        assert!(matches!(
            ledger.list().await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use common_types::formats::date_to_epoch_seconds;
use common_types::StormReport;

use super::{Provenance, Rejection, StoreError, StormStore, UpsertOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredReport {
    pub id: i64,
    pub report: StormReport,
    pub date_epoch: Option<i64>,
    pub provenance: Provenance,
}

/// In-process store with the same upsert and range semantics as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryStormStore {
    rows: Mutex<Vec<StoredReport>>,
    rejections: Mutex<Vec<Rejection>>,
    next_id: Mutex<i64>,
}

impl MemoryStormStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reports(reports: impl IntoIterator<Item = StormReport>) -> Self {
        let store = Self::new();
        for (offset, report) in reports.into_iter().enumerate() {
            store.put(&report, Provenance {
                kafka_partition: 0,
                kafka_offset: offset as i64,
            });
        }
        store
    }

    pub fn rows(&self) -> Vec<StoredReport> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn rejections(&self) -> Vec<Rejection> {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, report: &StormReport, provenance: Provenance) -> UpsertOutcome {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let key = report.natural_key();
        let date_epoch = date_to_epoch_seconds(&report.date);

        if let Some(row) = rows.iter_mut().find(|r| r.report.natural_key() == key) {
            row.report = report.clone();
            row.date_epoch = date_epoch;
            row.provenance = provenance;
            return UpsertOutcome { created: false };
        }

        let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        *next_id += 1;
        rows.push(StoredReport {
            id: *next_id,
            report: report.clone(),
            date_epoch,
            provenance,
        });
        UpsertOutcome { created: true }
    }
}

#[async_trait]
impl StormStore for MemoryStormStore {
    async fn upsert(
        &self,
        report: &StormReport,
        provenance: Provenance,
    ) -> Result<UpsertOutcome, StoreError> {
        Ok(self.put(report, provenance))
    }

    async fn quarantine(&self, rejection: &Rejection) -> Result<(), StoreError> {
        let mut rejections = self
            .rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        rejections.retain(|r| r.provenance != rejection.provenance);
        rejections.push(rejection.clone());
        Ok(())
    }

    async fn get_storm_reports(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<StormReport>, StoreError> {
        let mut matching: Vec<StoredReport> = self
            .rows()
            .into_iter()
            .filter(|r| r.date_epoch.is_some_and(|d| d >= start && d <= end))
            .collect();
        matching.sort_by_key(|r| (r.date_epoch, r.report.time, r.id));
        Ok(matching.into_iter().map(|r| r.report).collect())
    }
}

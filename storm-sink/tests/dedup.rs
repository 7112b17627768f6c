use std::sync::Arc;

use async_trait::async_trait;
use common_kafka::message::IncomingMessage;
use common_kafka::session::{ClaimHandler, Disposition};
use common_types::StormReport;
use serde_json::json;

use storm_sink::handler::DedupHandler;
use storm_sink::store::memory::MemoryStormStore;
use storm_sink::store::{Provenance, Rejection, StoreError, StormStore, UpsertOutcome};

const PROCESSED_TOPIC: &str = "storm_reports_processed";

fn boston_hail() -> StormReport {
    StormReport::decode(
        json!({
            "date": "2024-12-09",
            "time": 1200,
            "size": 3.0,
            "fScale": "",
            "speed": 0,
            "location": "Boston",
            "county": "Suffolk",
            "state": "MA",
            "lat": 42.36,
            "lon": -71.06,
            "comments": "",
            "type": "hail"
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap()
}

fn processed(offset: i64, report: &StormReport) -> IncomingMessage {
    IncomingMessage::new(PROCESSED_TOPIC, 1, offset, Some(report.encode().unwrap().as_slice()))
}

#[tokio::test]
async fn upserting_twice_keeps_one_row() {
    let store = MemoryStormStore::new();
    let provenance = Provenance {
        kafka_partition: 0,
        kafka_offset: 0,
    };

    let first = store.upsert(&boston_hail(), provenance).await.unwrap();
    let second = store.upsert(&boston_hail(), provenance).await.unwrap();

    assert_eq!(first, UpsertOutcome { created: true });
    assert_eq!(second, UpsertOutcome { created: false });
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn last_write_wins_on_non_key_fields() {
    let store = MemoryStormStore::new();
    let mut later = boston_hail();
    later.comments = "quarter sized".to_string();
    later.size = 1.0;

    store
        .upsert(&boston_hail(), Provenance { kafka_partition: 0, kafka_offset: 10 })
        .await
        .unwrap();
    store
        .upsert(&later, Provenance { kafka_partition: 2, kafka_offset: 11 })
        .await
        .unwrap();

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].report.comments, "quarter sized");
    assert_eq!(rows[0].report.size, 1.0);
    assert_eq!(rows[0].provenance, Provenance { kafka_partition: 2, kafka_offset: 11 });
}

#[tokio::test]
async fn different_natural_keys_are_different_rows() {
    let store = MemoryStormStore::new();
    let mut elsewhere = boston_hail();
    elsewhere.location = "Cambridge".to_string();
    let mut later = boston_hail();
    later.time = 1215;

    for report in [boston_hail(), elsewhere, later] {
        let provenance = Provenance { kafka_partition: 0, kafka_offset: 0 };
        assert!(store.upsert(&report, provenance).await.unwrap().created);
    }
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn handler_stores_processed_messages() {
    let store = Arc::new(MemoryStormStore::new());
    let handler = DedupHandler::new(store.clone());

    assert_eq!(handler.consume(&processed(7, &boston_hail())).await, Disposition::Mark);
    // Redelivery of the same record
    assert_eq!(handler.consume(&processed(7, &boston_hail())).await, Disposition::Mark);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].report, boston_hail());
    assert_eq!(rows[0].provenance, Provenance { kafka_partition: 1, kafka_offset: 7 });
    assert_eq!(rows[0].date_epoch, Some(1733702400));
}

#[tokio::test]
async fn handler_quarantines_poison_pills() {
    let store = Arc::new(MemoryStormStore::new());
    let handler = DedupHandler::new(store.clone());

    let garbage = IncomingMessage::new(PROCESSED_TOPIC, 0, 3, Some(&b"{\"time\":\"soon\"}"[..]));
    assert_eq!(handler.consume(&garbage).await, Disposition::Mark);

    let empty = IncomingMessage::new(PROCESSED_TOPIC, 0, 4, None);
    assert_eq!(handler.consume(&empty).await, Disposition::Mark);

    assert!(store.is_empty());
    let rejections = store.rejections();
    assert_eq!(rejections.len(), 2);
    assert_eq!(
        rejections[0].provenance,
        Provenance { kafka_partition: 0, kafka_offset: 3 }
    );
    assert_eq!(rejections[0].payload, "{\"time\":\"soon\"}");
    assert!(!rejections[0].error.is_empty());
    assert_eq!(rejections[1].payload, "");
}

#[tokio::test]
async fn redelivered_poison_pills_are_quarantined_once() {
    let store = Arc::new(MemoryStormStore::new());
    let handler = DedupHandler::new(store.clone());

    let garbage = IncomingMessage::new(PROCESSED_TOPIC, 2, 9, Some(&b"not json"[..]));
    handler.consume(&garbage).await;
    handler.consume(&garbage).await;

    assert_eq!(store.rejections().len(), 1);
}

struct BrokenStore;

#[async_trait]
impl StormStore for BrokenStore {
    async fn upsert(
        &self,
        _report: &StormReport,
        _provenance: Provenance,
    ) -> Result<UpsertOutcome, StoreError> {
        Err(StoreError::PoolExhausted)
    }

    async fn quarantine(&self, _rejection: &Rejection) -> Result<(), StoreError> {
        Err(StoreError::PoolExhausted)
    }

    async fn get_storm_reports(
        &self,
        _start: i64,
        _end: i64,
    ) -> Result<Vec<StormReport>, StoreError> {
        Err(StoreError::PoolExhausted)
    }
}

#[tokio::test]
async fn store_failures_are_held() {
    let handler = DedupHandler::new(Arc::new(BrokenStore));
    assert_eq!(handler.consume(&processed(0, &boston_hail())).await, Disposition::Hold);

    let garbage = IncomingMessage::new(PROCESSED_TOPIC, 0, 1, Some(&b"not json"[..]));
    assert_eq!(handler.consume(&garbage).await, Disposition::Hold);
}

#[tokio::test]
async fn range_queries_cover_the_requested_day() {
    let mut next_day = boston_hail();
    next_day.date = "2024-12-10".to_string();
    next_day.time = 100;
    let mut epoch_dated = boston_hail();
    epoch_dated.date = "1733773195".to_string();
    epoch_dated.time = 1900;
    let mut undated = boston_hail();
    undated.date = "sometime".to_string();
    undated.time = 2000;

    let store = MemoryStormStore::with_reports([
        boston_hail(),
        next_day.clone(),
        epoch_dated.clone(),
        undated,
    ]);

    let day = store
        .get_storm_reports(1733702400, 1733702400 + 86399)
        .await
        .unwrap();
    assert_eq!(day, vec![boston_hail(), epoch_dated]);

    let next = store
        .get_storm_reports(1733788800, 1733788800 + 86399)
        .await
        .unwrap();
    assert_eq!(next, vec![next_day]);
}

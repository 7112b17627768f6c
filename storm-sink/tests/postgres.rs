use common_types::{StormReport, StormType};
use sqlx::PgPool;

use storm_sink::store::postgres::PgStormStore;
use storm_sink::store::{Provenance, Rejection, StormStore};

fn tornado(time: i32, comments: &str) -> StormReport {
    StormReport {
        date: "2024-12-09".to_string(),
        time,
        size: 0.0,
        f_scale: "EF2".to_string(),
        speed: 0,
        location: "3 N Wichita".to_string(),
        county: "Sedgwick".to_string(),
        state: "KS".to_string(),
        lat: 37.74,
        lon: -97.33,
        comments: comments.to_string(),
        kind: StormType::Tornado,
    }
}

const AT_ZERO: Provenance = Provenance {
    kafka_partition: 0,
    kafka_offset: 0,
};

async fn row_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM storm_reports")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn upsert_is_idempotent(pool: PgPool) {
    let store = PgStormStore::new(pool.clone());

    assert!(store.upsert(&tornado(1530, ""), AT_ZERO).await.unwrap().created);
    assert!(!store.upsert(&tornado(1530, ""), AT_ZERO).await.unwrap().created);

    assert_eq!(row_count(&pool).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn later_writes_overwrite_non_key_fields(pool: PgPool) {
    let store = PgStormStore::new(pool.clone());

    store.upsert(&tornado(1530, "first"), AT_ZERO).await.unwrap();
    let later = Provenance {
        kafka_partition: 3,
        kafka_offset: 99,
    };
    store.upsert(&tornado(1530, "second"), later).await.unwrap();

    let (comments, partition, offset): (String, i32, i64) = sqlx::query_as(
        "SELECT comments, kafka_partition, kafka_offset FROM storm_reports",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(comments, "second");
    assert_eq!((partition, offset), (3, 99));
    assert_eq!(row_count(&pool).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn range_query_returns_reports_for_the_day(pool: PgPool) {
    let store = PgStormStore::new(pool);

    store.upsert(&tornado(1530, ""), AT_ZERO).await.unwrap();
    store.upsert(&tornado(1545, ""), AT_ZERO).await.unwrap();
    let mut next_day = tornado(100, "");
    next_day.date = "2024-12-10".to_string();
    store.upsert(&next_day, AT_ZERO).await.unwrap();

    let day = store
        .get_storm_reports(1733702400, 1733702400 + 86399)
        .await
        .unwrap();
    assert_eq!(day, vec![tornado(1530, ""), tornado(1545, "")]);

    let empty = store.get_storm_reports(0, 86399).await.unwrap();
    assert!(empty.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn quarantine_keeps_one_row_per_position(pool: PgPool) {
    let store = PgStormStore::new(pool.clone());
    let rejection = |error: &str| Rejection {
        provenance: Provenance {
            kafka_partition: 1,
            kafka_offset: 42,
        },
        error: error.to_string(),
        payload: "not json\0".to_string(),
    };

    store.quarantine(&rejection("first")).await.unwrap();
    store.quarantine(&rejection("second")).await.unwrap();

    let (error, payload): (String, String) =
        sqlx::query_as("SELECT error, payload FROM storm_report_rejections")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(error, "second");
    assert_eq!(payload, "not json");
}

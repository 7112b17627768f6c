use std::time::Duration;

use async_trait::async_trait;
use common_metrics::timing_guard;
use common_types::formats::date_to_epoch_seconds;
use common_types::{StormReport, StormType};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Row};

use super::{Provenance, Rejection, StoreError, StormStore, UpsertOutcome};

const DB_QUERY_DURATION: &str = "storm_store_db_query_duration_ms";

const UPSERT_REPORT: &str = r#"
INSERT INTO storm_reports (
    "date", date_epoch, "time", size, f_scale, speed, location, county, state,
    lat, lon, comments, "type", kafka_partition, kafka_offset
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
ON CONFLICT ("time", "type", location, lat, lon) DO UPDATE SET
    "date" = EXCLUDED."date",
    date_epoch = EXCLUDED.date_epoch,
    size = EXCLUDED.size,
    f_scale = EXCLUDED.f_scale,
    speed = EXCLUDED.speed,
    county = EXCLUDED.county,
    state = EXCLUDED.state,
    comments = EXCLUDED.comments,
    kafka_partition = EXCLUDED.kafka_partition,
    kafka_offset = EXCLUDED.kafka_offset,
    updated_at = NOW()
RETURNING (xmax = 0) AS created
"#;

const QUARANTINE_MESSAGE: &str = r#"
INSERT INTO storm_report_rejections (kafka_partition, kafka_offset, error, payload)
VALUES ($1, $2, $3, $4)
ON CONFLICT (kafka_partition, kafka_offset) DO UPDATE SET
    error = EXCLUDED.error,
    payload = EXCLUDED.payload
"#;

const REPORTS_BETWEEN: &str = r#"
SELECT "date", "time", size, f_scale, speed, location, county, state, lat, lon, comments, "type"
FROM storm_reports
WHERE date_epoch BETWEEN $1 AND $2
ORDER BY date_epoch, "time", id
"#;

#[derive(Debug, FromRow)]
struct ReportRow {
    date: String,
    time: i32,
    size: f64,
    f_scale: String,
    speed: i32,
    location: String,
    county: String,
    state: String,
    lat: f64,
    lon: f64,
    comments: String,
    #[sqlx(rename = "type")]
    kind: String,
}

impl From<ReportRow> for StormReport {
    fn from(row: ReportRow) -> Self {
        StormReport {
            date: row.date,
            time: row.time,
            size: row.size,
            f_scale: row.f_scale,
            speed: row.speed,
            location: row.location,
            county: row.county,
            state: row.state,
            lat: row.lat,
            lon: row.lon,
            comments: row.comments,
            kind: StormType::from(row.kind),
        }
    }
}

pub struct PgStormStore {
    pool: PgPool,
}

impl PgStormStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StormStore for PgStormStore {
    async fn upsert(
        &self,
        report: &StormReport,
        provenance: Provenance,
    ) -> Result<UpsertOutcome, StoreError> {
        let _timer = timing_guard(DB_QUERY_DURATION, &[("query", "upsert".to_string())]);

        let row = sqlx::query(UPSERT_REPORT)
            .bind(&report.date)
            .bind(date_to_epoch_seconds(&report.date))
            .bind(report.time)
            .bind(report.size)
            .bind(&report.f_scale)
            .bind(report.speed)
            .bind(&report.location)
            .bind(&report.county)
            .bind(&report.state)
            .bind(report.lat)
            .bind(report.lon)
            .bind(&report.comments)
            .bind(report.kind.as_str())
            .bind(provenance.kafka_partition)
            .bind(provenance.kafka_offset)
            .fetch_one(&self.pool)
            .await?;

        Ok(UpsertOutcome {
            created: row.try_get("created")?,
        })
    }

    async fn quarantine(&self, rejection: &Rejection) -> Result<(), StoreError> {
        let _timer = timing_guard(DB_QUERY_DURATION, &[("query", "quarantine".to_string())]);

        sqlx::query(QUARANTINE_MESSAGE)
            .bind(rejection.provenance.kafka_partition)
            .bind(rejection.provenance.kafka_offset)
            // Postgres TEXT can't hold NUL
            .bind(rejection.error.replace('\0', ""))
            .bind(rejection.payload.replace('\0', ""))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_storm_reports(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<StormReport>, StoreError> {
        let _timer = timing_guard(DB_QUERY_DURATION, &[("query", "range".to_string())]);

        let rows: Vec<ReportRow> = sqlx::query_as(REPORTS_BETWEEN)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StormReport::from).collect())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::PoolExhausted,

            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),

            _ => StoreError::Query(err.to_string()),
        }
    }
}

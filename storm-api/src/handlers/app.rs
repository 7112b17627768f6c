use std::sync::Arc;

use axum::{routing, Router};
use storm_sink::store::StormStore;

use super::messages;

pub fn add_routes<S: StormStore>(router: Router, store: Arc<S>) -> Router {
    router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route("/_liveness", routing::get(index))
        .route(
            "/messages",
            routing::get(messages::get_messages::<S>).with_state(store),
        )
}

pub async fn index() -> &'static str {
    "storm api"
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use common_types::{StormReport, StormType};
    use http_body_util::BodyExt; // for `collect`
    use serde_json::{json, Value};
    use storm_sink::store::memory::MemoryStormStore;
    use storm_sink::store::{Provenance, Rejection, StoreError, UpsertOutcome};
    use tower::ServiceExt; // for `call`, `oneshot`, and `ready`

    const DEC_9: i64 = 1733702400;

    fn hail(date: &str, time: i32, location: &str) -> StormReport {
        StormReport {
            date: date.to_string(),
            time,
            size: 1.75,
            f_scale: "".to_string(),
            speed: 0,
            location: location.to_string(),
            county: "Suffolk".to_string(),
            state: "MA".to_string(),
            lat: 42.36,
            lon: -71.06,
            comments: "".to_string(),
            kind: StormType::Hail,
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn app_with(reports: Vec<StormReport>) -> Router {
        add_routes(
            Router::new(),
            Arc::new(MemoryStormStore::with_reports(reports)),
        )
    }

    #[tokio::test]
    async fn index() {
        let app = add_routes(Router::new(), Arc::new(MemoryStormStore::new()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"storm api");
    }

    #[tokio::test]
    async fn returns_reports_for_the_requested_day() {
        let app = app_with(vec![
            hail("2024-12-09", 1200, "Boston"),
            hail("2024-12-09", 1230, "Quincy"),
            hail("2024-12-10", 100, "Boston"),
        ]);

        let (status, body) = get(app, &format!("/messages?date={}", DEC_9)).await;

        assert_eq!(status, StatusCode::OK);
        assert_json_eq!(
            body,
            json!([
                {
                    "date": "2024-12-09",
                    "time": 1200,
                    "size": 1.75,
                    "fScale": "",
                    "speed": 0,
                    "location": "Boston",
                    "county": "Suffolk",
                    "state": "MA",
                    "lat": 42.36,
                    "lon": -71.06,
                    "comments": "",
                    "type": "hail"
                },
                {
                    "date": "2024-12-09",
                    "time": 1230,
                    "size": 1.75,
                    "fScale": "",
                    "speed": 0,
                    "location": "Quincy",
                    "county": "Suffolk",
                    "state": "MA",
                    "lat": 42.36,
                    "lon": -71.06,
                    "comments": "",
                    "type": "hail"
                }
            ])
        );
    }

    #[tokio::test]
    async fn missing_date_means_today() {
        let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let app = app_with(vec![
            hail(&today, 900, "Boston"),
            hail("2024-12-09", 1200, "Boston"),
        ]);

        let (status, body) = get(app.clone(), "/messages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["date"], json!(today));

        let (status, body) = get(app, "/messages?date=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_integer_dates() {
        for date in ["2024-12-09", "abc", "1733702400.5"] {
            let app = app_with(vec![hail("2024-12-09", 1200, "Boston")]);
            let (status, body) = get(app, &format!("/messages?date={}", date)).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_json_eq!(body, json!({"error": "Invalid 'date' query parameter"}));
        }
    }

    #[tokio::test]
    async fn rejects_dates_whose_day_overflows() {
        let app = app_with(vec![hail("2024-12-09", 1200, "Boston")]);

        let (status, body) = get(app, &format!("/messages?date={}", i64::MAX)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_json_eq!(body, json!({"error": "Invalid 'date' query parameter"}));
    }

    #[tokio::test]
    async fn empty_days_are_not_found() {
        let app = app_with(vec![hail("2024-12-09", 1200, "Boston")]);

        let (status, body) = get(app, &format!("/messages?date={}", DEC_9 + 86400)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_json_eq!(
            body,
            json!({"error": "No storm reports found for the given date"})
        );
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
            Err(StoreError::Query("relation does not exist".to_string()))
        }
    }

    #[tokio::test]
    async fn store_errors_are_internal() {
        let app = add_routes(Router::new(), Arc::new(BrokenStore));

        let (status, body) = get(app, &format!("/messages?date={}", DEC_9)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_json_eq!(
            body,
            json!({
                "error": "Failed to retrieve storm reports: Database query error: relation does not exist"
            })
        );
    }
}

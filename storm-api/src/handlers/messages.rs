use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use common_types::formats::day_bounds;
use common_types::StormReport;
use serde::{Deserialize, Serialize};
use storm_sink::store::StormStore;
use tracing::{debug, error};

use crate::metrics_consts::{INVALID_DATE, REPORTS_RETURNED, STORE_ERROR};

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, msg: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_owned(),
        }),
    )
}

/// Storm reports for the day starting at `date` (unix seconds), or for today (UTC) when no
/// date is given.
pub async fn get_messages<S: StormStore>(
    State(store): State<Arc<S>>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<StormReport>>, ApiError> {
    let start_of_day = match query.date.as_deref().map(str::trim) {
        None | Some("") => Some(start_of_today()),
        Some(date) => date.parse::<i64>().ok(),
    };
    let Some((start, end)) = start_of_day.and_then(day_bounds) else {
        metrics::counter!(INVALID_DATE).increment(1);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid 'date' query parameter",
        ));
    };
    debug!(start, end, "Fetching storm reports");

    let reports = store.get_storm_reports(start, end).await.map_err(|e| {
        error!("Failed to retrieve storm reports: {}", e);
        metrics::counter!(STORE_ERROR).increment(1);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to retrieve storm reports: {}", e),
        )
    })?;

    if reports.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "No storm reports found for the given date",
        ));
    }

    metrics::histogram!(REPORTS_RETURNED).record(reports.len() as f64);
    Ok(Json(reports))
}

fn start_of_today() -> i64 {
    let now = Utc::now().timestamp();
    now - now.rem_euclid(86400)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_starts_at_utc_midnight() {
        let start = start_of_today();
        let today = Utc::now().date_naive();

        assert_eq!(start % 86400, 0);
        assert_eq!(
            chrono::DateTime::from_timestamp(start, 0).unwrap().date_naive(),
            today
        );
    }
}

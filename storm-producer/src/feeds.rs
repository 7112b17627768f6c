use chrono::DateTime;
use common_types::StormType;
use serde_json::{Map, Value};
use thiserror::Error;

/// SPC publishes one CSV per storm type, under these file name suffixes.
const FEEDS: [(StormType, &str); 3] = [
    (StormType::Tornado, "torn"),
    (StormType::Hail, "hail"),
    (StormType::Wind, "wind"),
];

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("report date {0} is outside the supported timestamp range")]
    InvalidDate(i64),
    #[error("failed to read csv feed: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub kind: StormType,
    pub url: String,
}

/// The three storm type feeds for the UTC day containing `report_date` (unix seconds), or the
/// rolling "today" feeds when no date is given.
pub fn feed_urls(base_url: &str, report_date: Option<i64>) -> Result<Vec<Feed>, FeedError> {
    let base = base_url.trim_end_matches('/');
    let prefix = match report_date {
        Some(ts) => {
            let day = DateTime::from_timestamp(ts, 0).ok_or(FeedError::InvalidDate(ts))?;
            format!("{}_rpts", day.format("%y%m%d"))
        }
        None => "today".to_string(),
    };

    Ok(FEEDS
        .iter()
        .map(|(kind, suffix)| Feed {
            kind: kind.clone(),
            url: format!("{base}/{prefix}_{suffix}.csv"),
        })
        .collect())
}

/// Turn a feed's CSV body into raw report objects, keyed by the CSV header names and tagged
/// with `type` and `date`. Values are kept as text, the etl does the conversion.
///
/// Rows are not validated here. SPC's combined files repeat the header line between storm
/// types, and those rows are passed along for the etl's header guard to reject.
pub fn parse_feed(
    body: &[u8],
    kind: &StormType,
    date: &str,
) -> Result<Vec<Map<String, Value>>, FeedError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), Value::String(value.to_string())))
            .collect();
        row.insert("date".to_string(), Value::String(date.to_string()));
        row.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        rows.push(row);
    }
    Ok(rows)
}

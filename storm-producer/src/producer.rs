use std::sync::Arc;

use chrono::Utc;
use common_kafka::publisher::{PublishError, RecordPublisher};
use common_metrics::timing_guard;
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::feeds::{feed_urls, parse_feed, Feed, FeedError};
use crate::fetch::{fetch_feed, FetchError};
use crate::metrics_consts::{
    FEEDS_FETCHED, FEED_ERROR, PUBLISH_ERROR, REPORTS_OVERSIZE, REPORTS_PUBLISHED, RUN_TIME,
};

#[derive(Debug, Error)]
pub enum ProduceError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("failed to encode raw report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to publish raw report: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub oversize: usize,
    pub failed_feeds: usize,
}

/// Fetches the SPC storm report feeds and publishes every row to the raw topic.
pub struct ReportProducer<P: RecordPublisher> {
    client: Client,
    publisher: Arc<P>,
    base_url: String,
    raw_topic: String,
    max_message_bytes: usize,
}

impl<P: RecordPublisher> ReportProducer<P> {
    pub fn new(
        client: Client,
        publisher: Arc<P>,
        base_url: impl Into<String>,
        raw_topic: impl Into<String>,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            client,
            publisher,
            base_url: base_url.into(),
            raw_topic: raw_topic.into(),
            max_message_bytes,
        }
    }

    /// One pass over the tornado, hail and wind feeds, in that order.
    ///
    /// Every row is stamped with `report_date` when given, otherwise with the current time in
    /// milliseconds. A feed that can't be fetched or parsed is skipped. A failed publish ends
    /// the run, the next one starts over.
    pub async fn run_once(&self, report_date: Option<i64>) -> Result<RunSummary, ProduceError> {
        let _timer = timing_guard(RUN_TIME, &[]);
        let stamp = match report_date {
            Some(ts) => ts.to_string(),
            None => Utc::now().timestamp_millis().to_string(),
        };

        let mut summary = RunSummary::default();
        for feed in feed_urls(&self.base_url, report_date)? {
            let rows = match self.load(&feed, &stamp).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(url = feed.url, "Skipping storm report feed: {}", e);
                    metrics::counter!(FEED_ERROR, "type" => feed.kind.as_str().to_owned())
                        .increment(1);
                    summary.failed_feeds += 1;
                    continue;
                }
            };
            metrics::counter!(FEEDS_FETCHED).increment(1);
            info!(url = feed.url, rows = rows.len(), "Fetched storm report feed");

            for row in rows {
                let payload = serde_json::to_vec(&row)?;
                if payload.len() > self.max_message_bytes {
                    error!(
                        size = payload.len(),
                        limit = self.max_message_bytes,
                        "Raw report exceeds the message size limit, skipping"
                    );
                    metrics::counter!(REPORTS_OVERSIZE).increment(1);
                    summary.oversize += 1;
                    continue;
                }

                if let Err(e) = self.publisher.publish(&self.raw_topic, None, &payload).await {
                    metrics::counter!(PUBLISH_ERROR).increment(1);
                    return Err(e.into());
                }
                metrics::counter!(REPORTS_PUBLISHED).increment(1);
                summary.published += 1;
            }
        }

        Ok(summary)
    }

    async fn load(
        &self,
        feed: &Feed,
        stamp: &str,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, LoadError> {
        let body = fetch_feed(&self.client, &feed.url).await?;
        Ok(parse_feed(&body, &feed.kind, stamp)?)
    }
}

#[derive(Debug, Error)]
enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

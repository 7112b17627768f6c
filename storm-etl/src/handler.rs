use std::sync::Arc;

use async_trait::async_trait;
use common_kafka::message::{IncomingMessage, Partition};
use common_kafka::session::{ClaimHandler, Disposition};
use common_metrics::timing_guard;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::dead_letter::RejectedMessage;
use crate::metrics_consts::{
    HANDLE_TIME, PUBLISH_ERROR, REPORTS_DEAD_LETTERED, REPORTS_PUBLISHED, REPORTS_REJECTED,
    REPORTS_TRANSFORMED, UNKNOWN_STORM_TYPE,
};
use crate::publisher::RecordPublisher;
use crate::transform::{parse, TransformError};

/// Why a raw message can never be forwarded.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    Oversize { size: usize, limit: usize },
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Transform(e) => e.kind(),
            Rejection::Oversize { .. } => "oversize",
        }
    }
}

/// Raw topic handler: transform each report and republish it on the processed topic,
/// dead-lettering what can't be transformed.
pub struct EtlHandler<P: RecordPublisher> {
    publisher: Arc<P>,
    processed_topic: String,
    dead_letter_topic: Option<String>,
    max_message_bytes: usize,
}

impl<P: RecordPublisher> EtlHandler<P> {
    pub fn new(
        publisher: Arc<P>,
        processed_topic: impl Into<String>,
        dead_letter_topic: Option<&str>,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            publisher,
            processed_topic: processed_topic.into(),
            dead_letter_topic: dead_letter_topic.map(str::to_owned),
            max_message_bytes,
        }
    }

    async fn handle(&self, message: &IncomingMessage) -> (Disposition, &'static str) {
        let size = message.payload_len();
        if size > self.max_message_bytes {
            let rejection = Rejection::Oversize {
                size,
                limit: self.max_message_bytes,
            };
            return self.reject(message, rejection).await;
        }

        let payload = message.payload.as_deref().unwrap_or_default();
        let report = match parse(payload) {
            Ok(report) => report,
            Err(e) => return self.reject(message, e.into()).await,
        };

        if !report.kind.is_known() {
            metrics::counter!(UNKNOWN_STORM_TYPE).increment(1);
        }
        let canonical = match report.encode() {
            Ok(canonical) => canonical,
            Err(e) => return self.reject(message, TransformError::from(e).into()).await,
        };
        metrics::counter!(REPORTS_TRANSFORMED).increment(1);

        let key = report.natural_key().to_message_key();
        match self
            .publisher
            .publish(&self.processed_topic, Some(&key), &canonical)
            .await
        {
            Ok((partition, offset)) => {
                info!(
                    source = %message.partition,
                    source_offset = message.offset,
                    partition,
                    offset,
                    "Published storm report"
                );
                metrics::counter!(REPORTS_PUBLISHED).increment(1);
                (Disposition::Mark, "published")
            }
            Err(e) => {
                error!(
                    source = %message.partition,
                    source_offset = message.offset,
                    "Failed to publish storm report: {}",
                    e
                );
                metrics::counter!(PUBLISH_ERROR, "topic" => "processed").increment(1);
                (Disposition::Hold, "publish_failed")
            }
        }
    }

    async fn reject(
        &self,
        message: &IncomingMessage,
        rejection: Rejection,
    ) -> (Disposition, &'static str) {
        warn!(
            source = %message.partition,
            source_offset = message.offset,
            "Rejected raw message: {}",
            rejection
        );
        metrics::counter!(REPORTS_REJECTED, "reason" => rejection.kind()).increment(1);

        let Some(topic) = &self.dead_letter_topic else {
            return (Disposition::Hold, "rejected");
        };

        let rejected = RejectedMessage::new(message, &rejection);
        let payload = match serde_json::to_vec(&rejected) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode dead-letter message: {}", e);
                return (Disposition::Hold, "dead_letter_failed");
            }
        };

        match self
            .publisher
            .publish(topic, Some(&rejected.key()), &payload)
            .await
        {
            Ok(_) => {
                metrics::counter!(REPORTS_DEAD_LETTERED).increment(1);
                (Disposition::Mark, "dead_lettered")
            }
            Err(e) => {
                error!(
                    source = %message.partition,
                    source_offset = message.offset,
                    "Failed to publish dead-letter message: {}",
                    e
                );
                metrics::counter!(PUBLISH_ERROR, "topic" => "dead_letter").increment(1);
                (Disposition::Hold, "dead_letter_failed")
            }
        }
    }
}

#[async_trait]
impl<P: RecordPublisher> ClaimHandler for EtlHandler<P> {
    fn setup(&self, partitions: &[Partition]) {
        for partition in partitions {
            info!(%partition, "Claimed raw partition");
        }
    }

    fn cleanup(&self, partitions: &[Partition]) {
        for partition in partitions {
            info!(%partition, "Released raw partition");
        }
    }

    async fn consume(&self, message: &IncomingMessage) -> Disposition {
        let timer = timing_guard(HANDLE_TIME, &[]);
        let (disposition, outcome) = self.handle(message).await;
        timer.label("outcome", outcome).fin();
        disposition
    }
}

use std::time::Duration;

use async_trait::async_trait;
use crate::kafka_producer::KafkaProduceError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::warn;

pub type PublishError = KafkaProduceError;

/// Sends one payload to a topic and reports where it landed. One attempt per call, retries
/// are the caller's business.
#[async_trait]
pub trait RecordPublisher: Send + Sync + 'static {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<(i32, i64), PublishError>;
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(producer: FutureProducer, send_timeout: Duration) -> Self {
        Self {
            producer,
            send_timeout,
        }
    }

    /// Wait for queued sends to be delivered, bounded by the send timeout.
    pub fn flush(&self) {
        if let Err(e) = self.producer.flush(Timeout::After(self.send_timeout)) {
            warn!("Failed to flush producer on graceful shutdown: {e:?}");
        }
    }
}

#[async_trait]
impl RecordPublisher for KafkaPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &[u8],
    ) -> Result<(i32, i64), PublishError> {
        let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, Timeout::After(self.send_timeout))
            .await
            .map_err(|(e, _)| PublishError::from(e))
    }
}

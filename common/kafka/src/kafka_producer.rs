use std::time::Duration;

use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, Producer};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::KafkaConfig;

const METADATA_PING_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn create_kafka_producer(config: &KafkaConfig) -> Result<FutureProducer, KafkaError> {
    let mut client_config = config.client_config();
    client_config
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        )
        .set(
            "queue.buffering.max.kbytes",
            (config.kafka_producer_queue_mib * 1024).to_string(),
        )
        .set(
            "message.max.bytes",
            config.kafka_max_message_bytes.to_string(),
        );

    debug!("rdkafka configuration: {:?}", client_config);
    let api: FutureProducer = client_config.create()?;

    // "Ping" the Kafka brokers by requesting metadata
    match api.client().fetch_metadata(None, METADATA_PING_TIMEOUT) {
        Ok(metadata) => {
            info!(
                "Successfully connected to Kafka brokers. Found {} topics.",
                metadata.topics().len()
            );
        }
        Err(error) => {
            error!("Failed to fetch metadata from Kafka brokers: {:?}", error);
            return Err(error);
        }
    }

    Ok(api)
}

#[derive(Error, Debug)]
pub enum KafkaProduceError {
    #[error("failed to produce to kafka: {error}")]
    KafkaProduceError { error: KafkaError },
    #[error("failed to produce to kafka (timeout)")]
    KafkaProduceCanceled,
}

impl From<KafkaError> for KafkaProduceError {
    fn from(error: KafkaError) -> Self {
        match error {
            KafkaError::Canceled => KafkaProduceError::KafkaProduceCanceled,
            error => KafkaProduceError::KafkaProduceError { error },
        }
    }
}

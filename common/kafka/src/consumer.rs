use std::sync::Arc;
use std::time::{Duration, Instant};

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::ClientConfig;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{ConsumerConfig, KafkaConfig};
use crate::message::IncomingMessage;
use crate::metrics_consts::{
    KAFKA_CONSUMER_ERROR, KAFKA_MESSAGE_CONSUMED, KAFKA_MESSAGE_HANDLE_TIME, KAFKA_OFFSET_HELD,
    KAFKA_OFFSET_STORED,
};
use crate::offsets::OffsetTracker;
use crate::session::{ClaimHandler, Disposition, SessionContext};

const METADATA_PING_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("failed to create kafka consumer: {0}")]
    Create(#[from] KafkaError),
    #[error("fatal kafka error in consume loop: {0}")]
    Fatal(KafkaError),
}

/// A consumer group member reading one topic, handing each claimed message to a
/// [`ClaimHandler`] and storing offsets only for messages the handler marked.
///
/// Messages are handled one at a time, so within a partition a message and its offset
/// store complete before the next message is requested. Stored offsets are committed by
/// librdkafka in the background and synchronously on shutdown.
pub struct ClaimConsumer<H: ClaimHandler> {
    consumer: StreamConsumer<SessionContext<H>>,
    handler: Arc<H>,
    offsets: Arc<OffsetTracker>,
    topic: String,
}

impl<H: ClaimHandler> ClaimConsumer<H> {
    pub fn new(
        common_config: &KafkaConfig,
        consumer_config: &ConsumerConfig,
        handler: Arc<H>,
    ) -> Result<Self, ConsumerError> {
        let mut client_config: ClientConfig = common_config.client_config();
        client_config
            .set("group.id", &consumer_config.kafka_consumer_group)
            .set(
                "auto.offset.reset",
                &consumer_config.kafka_consumer_offset_reset,
            )
            // The loop decides when offsets advance, librdkafka commits whatever was stored
            .set("enable.auto.offset.store", "false")
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                consumer_config
                    .kafka_consumer_auto_commit_interval_ms
                    .to_string(),
            )
            .set(
                "fetch.message.max.bytes",
                common_config.kafka_max_message_bytes.to_string(),
            );

        let offsets = Arc::new(OffsetTracker::new());
        let context = SessionContext::new(handler.clone(), offsets.clone());
        let consumer: StreamConsumer<SessionContext<H>> =
            client_config.create_with_context(context)?;

        // Surface unreachable brokers here, where the supervisor can retry, rather than as a
        // silent consumer that never receives anything
        let metadata = consumer.fetch_metadata(
            Some(&consumer_config.kafka_consumer_topic),
            METADATA_PING_TIMEOUT,
        )?;
        debug!("Found {} topics in consumer metadata", metadata.topics().len());

        consumer.subscribe(&[consumer_config.kafka_consumer_topic.as_str()])?;

        info!(
            topic = consumer_config.kafka_consumer_topic,
            group_id = consumer_config.kafka_consumer_group,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            handler,
            offsets,
            topic: consumer_config.kafka_consumer_topic.clone(),
        })
    }

    /// Consume until shutdown is signalled or a fatal error occurs. The message in flight when
    /// shutdown arrives is handled to completion before stored offsets are committed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConsumerError> {
        info!(topic = self.topic, "Starting consume loop");
        let mut kafka_error_count = 0_u64;

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("Shutdown signal received, stopping consume loop");
                    break Ok(());
                }

                received = self.consumer.recv() => match received {
                    Ok(message) => {
                        kafka_error_count = 0;
                        metrics::counter!(KAFKA_MESSAGE_CONSUMED).increment(1);
                        let incoming = IncomingMessage::from(&message);
                        drop(message);
                        self.dispatch(&incoming).await;
                    }
                    Err(e) => {
                        kafka_error_count += 1;
                        match handle_kafka_error(&e, kafka_error_count).await {
                            ErrorAction::Retry(_) => {}
                            ErrorAction::Restart => break Err(ConsumerError::Fatal(e)),
                            ErrorAction::Stop => break Ok(()),
                        }
                    }
                },
            }
        };

        self.shutdown();
        result
    }

    async fn dispatch(&self, message: &IncomingMessage) {
        let started = Instant::now();
        let disposition = self.handler.consume(message).await;

        let outcome = match disposition {
            Disposition::Mark => "mark",
            Disposition::Hold => "hold",
        };
        metrics::histogram!(KAFKA_MESSAGE_HANDLE_TIME, "disposition" => outcome)
            .record(started.elapsed().as_millis() as f64);

        if let Some(next_offset) = next_stored_offset(&self.offsets, message, disposition) {
            match self.consumer.store_offset(
                message.topic(),
                message.partition_number(),
                next_offset,
            ) {
                Ok(()) => metrics::counter!(KAFKA_OFFSET_STORED).increment(1),
                // Typically the partition was revoked while the message was in flight, the
                // new owner will see it again
                Err(e) => warn!(
                    partition = %message.partition,
                    offset = message.offset,
                    "Failed to store offset: {}",
                    e
                ),
            }
        }
    }

    fn shutdown(&self) {
        info!("Graceful shutdown: committing stored offsets");
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => info!("Graceful shutdown: offsets committed"),
            // Nothing was stored since the last commit
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {}
            Err(e) => warn!("Graceful shutdown: failed to commit offsets: {}", e),
        }
        self.consumer.unsubscribe();
        info!("Graceful shutdown: unsubscribed from {}", self.topic);
    }
}

/// Decide which offset, if any, to store after handling `message`. Stored offsets point at
/// the next message to read.
pub(crate) fn next_stored_offset(
    offsets: &OffsetTracker,
    message: &IncomingMessage,
    disposition: Disposition,
) -> Option<i64> {
    match disposition {
        Disposition::Mark if offsets.complete(&message.partition, message.offset) => {
            Some(message.offset + 1)
        }
        Disposition::Mark => {
            debug!(
                partition = %message.partition,
                offset = message.offset,
                "Message handled behind a held offset, not marking"
            );
            metrics::counter!(KAFKA_OFFSET_HELD).increment(1);
            None
        }
        Disposition::Hold => {
            let held_at = offsets.hold(&message.partition, message.offset);
            warn!(
                partition = %message.partition,
                offset = message.offset,
                held_at,
                "Message not marked, it will be redelivered after a restart or rebalance"
            );
            metrics::counter!(KAFKA_OFFSET_HELD).increment(1);
            None
        }
    }
}

/// What the consume loop does after a receive error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorAction {
    /// Keep polling this consumer, after an optional pause.
    Retry(Duration),
    /// Give up on this consumer. The supervisor builds a fresh one after its retry interval.
    Restart,
    /// The consumer is shutting down.
    Stop,
}

// librdkafka reconnects on its own, but past this many consecutive broker errors a fresh
// consumer (with its metadata ping) is the quicker way back
const MAX_CONSECUTIVE_BROKER_ERRORS: u64 = 10;

fn backoff(consecutive: u64) -> Duration {
    Duration::from_millis(100 * consecutive.min(10))
}

fn classify_kafka_error(e: &KafkaError, consecutive: u64) -> (ErrorAction, &'static str) {
    match e {
        KafkaError::MessageConsumption(RDKafkaErrorCode::PartitionEOF) => {
            (ErrorAction::Retry(Duration::ZERO), "partition_eof")
        }
        KafkaError::MessageConsumption(RDKafkaErrorCode::OperationTimedOut) => {
            (ErrorAction::Retry(Duration::ZERO), "op_timed_out")
        }
        // auto.offset.reset seeks the partition, give it a moment
        KafkaError::MessageConsumption(RDKafkaErrorCode::OffsetOutOfRange) => (
            ErrorAction::Retry(Duration::from_millis(500)),
            "offset_out_of_range",
        ),
        KafkaError::MessageConsumption(_) => (ErrorAction::Retry(backoff(consecutive)), "consumer"),

        KafkaError::Global(
            RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure,
        ) if consecutive >= MAX_CONSECUTIVE_BROKER_ERRORS => (ErrorAction::Restart, "brokers_down"),
        KafkaError::Global(
            RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure,
        ) => (ErrorAction::Retry(backoff(consecutive)), "brokers_down"),
        KafkaError::Global(RDKafkaErrorCode::Authentication) => {
            (ErrorAction::Restart, "authentication")
        }
        KafkaError::Global(_) => (ErrorAction::Retry(backoff(consecutive)), "global"),

        KafkaError::MessageConsumptionFatal(_) => (ErrorAction::Restart, "consumer_fatal"),
        KafkaError::Canceled => (ErrorAction::Stop, "canceled"),
        _ => (ErrorAction::Restart, "unexpected"),
    }
}

/// Log and count a receive error, then apply its pause. Returns what the loop should do next.
async fn handle_kafka_error(e: &KafkaError, consecutive: u64) -> ErrorAction {
    let (action, kind) = classify_kafka_error(e, consecutive);
    let level = match action {
        ErrorAction::Retry(pause) if pause.is_zero() => {
            debug!(consecutive, "Kafka consumer: {}", e);
            "info"
        }
        ErrorAction::Retry(pause) => {
            warn!(consecutive, "Kafka consumer error, polling again in {:?}: {}", pause, e);
            sleep(pause).await;
            "warn"
        }
        ErrorAction::Restart => {
            error!(consecutive, "Kafka consumer error, restarting the consumer: {}", e);
            "fatal"
        }
        ErrorAction::Stop => {
            info!("Kafka consumer canceled");
            "info"
        }
    };
    metrics::counter!(KAFKA_CONSUMER_ERROR, "level" => level, "error" => kind).increment(1);
    action
}

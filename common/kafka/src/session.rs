use std::sync::Arc;

use async_trait::async_trait;
use rdkafka::consumer::{BaseConsumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientContext, TopicPartitionList};
use tracing::{debug, error, info, warn};

use crate::message::{IncomingMessage, Partition};
use crate::metrics_consts::{
    KAFKA_COMMIT_ERROR, REBALANCE_EMPTY_SKIPPED, REBALANCE_PARTITIONS_ASSIGNED,
    REBALANCE_PARTITIONS_REVOKED,
};
use crate::offsets::OffsetTracker;

/// What the consumer should do with a message once its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The message was fully handled (forwarded, persisted or dead-lettered) and its
    /// offset may be stored.
    Mark,
    /// The message was not fully handled and must be redelivered after a restart or
    /// rebalance. Nothing at or after it on the same partition is marked.
    Hold,
}

/// Per-claim message handling plus the session lifecycle hooks of a consumer group member.
///
/// `setup` and `cleanup` run synchronously inside librdkafka's rebalance callback, so they
/// must stay cheap.
#[async_trait]
pub trait ClaimHandler: Send + Sync + 'static {
    fn setup(&self, _partitions: &[Partition]) {}

    fn cleanup(&self, _partitions: &[Partition]) {}

    async fn consume(&self, message: &IncomingMessage) -> Disposition;
}

pub struct SessionContext<H: ClaimHandler> {
    handler: Arc<H>,
    offsets: Arc<OffsetTracker>,
}

impl<H: ClaimHandler> SessionContext<H> {
    pub fn new(handler: Arc<H>, offsets: Arc<OffsetTracker>) -> Self {
        Self { handler, offsets }
    }

    fn on_assign(&self, list: &TopicPartitionList) {
        if list.count() == 0 {
            debug!("Skipping empty assign rebalance");
            metrics::counter!(REBALANCE_EMPTY_SKIPPED, "event_type" => "assign").increment(1);
            return;
        }

        let partitions = Partition::from_list(list);
        info!(count = partitions.len(), "Session setup: partitions assigned");
        metrics::counter!(REBALANCE_PARTITIONS_ASSIGNED).increment(partitions.len() as u64);

        // A reassigned partition restarts from its committed offset, any earlier hold is void
        self.offsets.release(&partitions);
        self.handler.setup(&partitions);
    }

    fn on_revoke(&self, list: &TopicPartitionList) {
        if list.count() == 0 {
            debug!("Skipping empty revoke rebalance");
            metrics::counter!(REBALANCE_EMPTY_SKIPPED, "event_type" => "revoke").increment(1);
            return;
        }

        let partitions = Partition::from_list(list);
        info!(count = partitions.len(), "Session cleanup: partitions revoked");
        metrics::counter!(REBALANCE_PARTITIONS_REVOKED).increment(partitions.len() as u64);

        self.handler.cleanup(&partitions);
        self.offsets.release(&partitions);
    }
}

impl<H: ClaimHandler> ClientContext for SessionContext<H> {}

impl<H: ClaimHandler> ConsumerContext for SessionContext<H> {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Revoke(partitions) => self.on_revoke(partitions),
            Rebalance::Assign(partitions) => {
                debug!("Pre-rebalance assign event for {} partitions", partitions.count());
            }
            Rebalance::Error(e) => error!("Rebalance error: {}", e),
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(partitions) => self.on_assign(partitions),
            Rebalance::Revoke(_) => debug!("Post-rebalance revoke event"),
            Rebalance::Error(e) => error!("Post-rebalance error: {}", e),
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(_) => debug!("Committed offsets for {} partitions", offsets.count()),
            Err(e) => {
                warn!("Failed to commit offsets: {}", e);
                metrics::counter!(KAFKA_COMMIT_ERROR).increment(1);
            }
        }
    }
}

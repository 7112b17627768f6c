use std::sync::Arc;

use async_trait::async_trait;
use common_kafka::message::{IncomingMessage, Partition};
use common_kafka::session::{ClaimHandler, Disposition};
use common_metrics::timing_guard;
use common_types::StormReport;
use tracing::{debug, error, info, warn};

use crate::metrics_consts::{
    HANDLE_TIME, MALFORMED_PROCESSED_MESSAGE, REPORTS_CREATED, REPORTS_QUARANTINED,
    REPORTS_UPDATED, STORE_ERROR,
};
use crate::store::{Provenance, Rejection, StormStore};

/// Processed topic handler: upsert each canonical report by natural key.
pub struct DedupHandler<S: StormStore> {
    store: Arc<S>,
}

impl<S: StormStore> DedupHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn handle(&self, message: &IncomingMessage) -> (Disposition, &'static str) {
        let provenance = Provenance {
            kafka_partition: message.partition_number(),
            kafka_offset: message.offset,
        };

        let payload = message.payload.as_deref().unwrap_or_default();
        let report = match StormReport::decode(payload) {
            Ok(report) => report,
            // Only the etl writes to this topic, so this is a poison pill. It is quarantined
            // and its offset stored, it will never decode on redelivery either.
            Err(e) => return self.quarantine(message, provenance, e.to_string()).await,
        };

        match self.store.upsert(&report, provenance).await {
            Ok(outcome) if outcome.created => {
                info!(
                    partition = %message.partition,
                    offset = message.offset,
                    key = report.natural_key().to_message_key(),
                    "Stored new storm report"
                );
                metrics::counter!(REPORTS_CREATED).increment(1);
                (Disposition::Mark, "created")
            }
            Ok(_) => {
                debug!(
                    partition = %message.partition,
                    offset = message.offset,
                    key = report.natural_key().to_message_key(),
                    "Updated existing storm report"
                );
                metrics::counter!(REPORTS_UPDATED).increment(1);
                (Disposition::Mark, "updated")
            }
            Err(e) => {
                error!(
                    partition = %message.partition,
                    offset = message.offset,
                    "Failed to store storm report: {}",
                    e
                );
                metrics::counter!(STORE_ERROR).increment(1);
                (Disposition::Hold, "store_failed")
            }
        }
    }
}

impl<S: StormStore> DedupHandler<S> {
    async fn quarantine(
        &self,
        message: &IncomingMessage,
        provenance: Provenance,
        error: String,
    ) -> (Disposition, &'static str) {
        let payload = String::from_utf8_lossy(message.payload.as_deref().unwrap_or_default());
        warn!(
            partition = %message.partition,
            offset = message.offset,
            %payload,
            "Quarantining malformed processed message: {}",
            error
        );
        metrics::counter!(MALFORMED_PROCESSED_MESSAGE).increment(1);

        let rejection = Rejection {
            provenance,
            error,
            payload: payload.into_owned(),
        };
        match self.store.quarantine(&rejection).await {
            Ok(()) => {
                metrics::counter!(REPORTS_QUARANTINED).increment(1);
                (Disposition::Mark, "quarantined")
            }
            Err(e) => {
                error!(
                    partition = %message.partition,
                    offset = message.offset,
                    "Failed to quarantine malformed message: {}",
                    e
                );
                metrics::counter!(STORE_ERROR).increment(1);
                (Disposition::Hold, "quarantine_failed")
            }
        }
    }
}

#[async_trait]
impl<S: StormStore> ClaimHandler for DedupHandler<S> {
    fn setup(&self, partitions: &[Partition]) {
        for partition in partitions {
            info!(%partition, "Claimed processed partition");
        }
    }

    fn cleanup(&self, partitions: &[Partition]) {
        for partition in partitions {
            info!(%partition, "Released processed partition");
        }
    }

    async fn consume(&self, message: &IncomingMessage) -> Disposition {
        let timer = timing_guard(HANDLE_TIME, &[]);
        let (disposition, outcome) = self.handle(message).await;
        timer.label("outcome", outcome).fin();
        disposition
    }
}

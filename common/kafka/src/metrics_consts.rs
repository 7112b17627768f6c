// ==== Consumer metrics ====
pub const KAFKA_CONSUMER_ERROR: &str = "kafka_consumer_error";
pub const KAFKA_MESSAGE_CONSUMED: &str = "kafka_message_consumed";

/// Counter for offsets stored after a message was marked
pub const KAFKA_OFFSET_STORED: &str = "kafka_offset_stored";

/// Counter for messages that completed but could not be marked behind a held message
pub const KAFKA_OFFSET_HELD: &str = "kafka_offset_held";

/// Histogram for time spent handling one message, labelled with the disposition
pub const KAFKA_MESSAGE_HANDLE_TIME: &str = "kafka_message_handle_time_ms";

// ==== Rebalance metrics ====
pub const REBALANCE_PARTITIONS_ASSIGNED: &str = "kafka_rebalance_partitions_assigned";
pub const REBALANCE_PARTITIONS_REVOKED: &str = "kafka_rebalance_partitions_revoked";
pub const REBALANCE_EMPTY_SKIPPED: &str = "kafka_rebalance_empty_skipped";
pub const KAFKA_COMMIT_ERROR: &str = "kafka_commit_error";

// ==== Supervisor metrics ====
pub const SUPERVISOR_CONNECT_FAILED: &str = "supervisor_connect_failed";
pub const SUPERVISOR_RESTARTS: &str = "supervisor_restarts";

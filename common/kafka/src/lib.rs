pub mod config;
pub mod consumer;
pub mod kafka_producer;
pub mod message;
pub mod metrics_consts;
pub mod offsets;
pub mod publisher;
pub mod session;
pub mod supervisor;

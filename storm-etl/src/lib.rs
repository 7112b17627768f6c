pub mod config;
pub mod dead_letter;
pub mod handler;
pub mod metrics_consts;
pub mod transform;

pub use common_kafka::publisher;

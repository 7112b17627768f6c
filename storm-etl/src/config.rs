use std::time::Duration;

use envconfig::Envconfig;

pub use common_kafka::config::{ConsumerConfig, KafkaConfig};

pub const DEFAULT_CONSUMER_GROUP: &str = "etl-consumer-group";
pub const DEFAULT_CONSUMER_TOPIC: &str = "storm_reports_raw";

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(from = "PROCESSED_TOPIC")]
    pub processed_topic: String,

    // Empty disables dead-lettering, rejected messages are then held for redelivery
    #[envconfig(from = "DEAD_LETTER_TOPIC", default = "storm_reports_dead_letter")]
    pub dead_letter_topic: String,

    #[envconfig(from = "MAX_MESSAGE_BYTES", default = "209715200")]
    pub max_message_bytes: usize,

    #[envconfig(from = "PRODUCER_SEND_TIMEOUT_MS", default = "5000")]
    pub producer_send_timeout_ms: u64,

    #[envconfig(from = "BIND_HOST", default = "::")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "3320")]
    pub bind_port: u16,
}

impl Config {
    pub fn init_with_defaults() -> Result<Config, envconfig::Error> {
        ConsumerConfig::set_defaults(DEFAULT_CONSUMER_GROUP, DEFAULT_CONSUMER_TOPIC);
        Self::init_from_env()
    }

    pub fn dead_letter_topic(&self) -> Option<&str> {
        let topic = self.dead_letter_topic.trim();
        (!topic.is_empty()).then_some(topic)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.producer_send_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}

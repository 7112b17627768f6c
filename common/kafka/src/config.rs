use std::time::Duration;

use envconfig::Envconfig;
use rdkafka::ClientConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct KafkaConfig {
    pub kafka_hosts: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    // Storm report batches from upstream can be large, match the broker-side limit
    #[envconfig(default = "209715200")]
    pub kafka_max_message_bytes: u32,

    // Fixed sleep between attempts to (re)connect to the brokers
    #[envconfig(default = "5")]
    pub kafka_connect_retry_secs: u64,
}

impl KafkaConfig {
    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_secs(self.kafka_connect_retry_secs)
    }

    /// Settings shared by producers and consumers.
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.kafka_hosts)
            .set("statistics.interval.ms", "10000");

        if self.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        client_config
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct ConsumerConfig {
    pub kafka_consumer_group: String,
    pub kafka_consumer_topic: String,

    // We default to "earliest" so a fresh group replays whatever the topic still holds
    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    // Offsets are stored explicitly once a message is fully handled and committed
    // in the background at this interval (in milliseconds)
    #[envconfig(default = "5000")]
    pub kafka_consumer_auto_commit_interval_ms: i32,
}

impl ConsumerConfig {
    /// The consumer config is application specific, so binaries can provide their
    /// group and topic defaults before loading their main config struct.
    pub fn set_defaults(consumer_group: &str, consumer_topic: &str) {
        if std::env::var("KAFKA_CONSUMER_GROUP").is_err() {
            std::env::set_var("KAFKA_CONSUMER_GROUP", consumer_group);
        };
        if std::env::var("KAFKA_CONSUMER_TOPIC").is_err() {
            std::env::set_var("KAFKA_CONSUMER_TOPIC", consumer_topic);
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tls: bool) -> KafkaConfig {
        KafkaConfig {
            kafka_hosts: "kafka:9092".to_string(),
            kafka_tls: tls,
            kafka_producer_linger_ms: 20,
            kafka_producer_queue_mib: 400,
            kafka_message_timeout_ms: 20000,
            kafka_compression_codec: "none".to_string(),
            kafka_max_message_bytes: 209715200,
            kafka_connect_retry_secs: 5,
        }
    }

    #[test]
    fn client_config_carries_hosts() {
        let client_config = config(false).client_config();
        assert_eq!(client_config.get("bootstrap.servers"), Some("kafka:9092"));
        assert_eq!(client_config.get("security.protocol"), None);
    }

    #[test]
    fn client_config_enables_tls() {
        let client_config = config(true).client_config();
        assert_eq!(client_config.get("security.protocol"), Some("ssl"));
    }

    #[test]
    fn retry_interval_is_in_seconds() {
        assert_eq!(config(false).connect_retry_interval(), Duration::from_secs(5));
    }
}

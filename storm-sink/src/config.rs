use envconfig::Envconfig;

pub use common_kafka::config::{ConsumerConfig, KafkaConfig};

pub const DEFAULT_CONSUMER_GROUP: &str = "sink-consumer-group";
pub const DEFAULT_CONSUMER_TOPIC: &str = "storm_reports_processed";

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "MAX_PG_CONNECTIONS", default = "10")]
    pub max_pg_connections: u32,

    #[envconfig(from = "BIND_HOST", default = "::")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "3321")]
    pub bind_port: u16,
}

impl Config {
    pub fn init_with_defaults() -> Result<Config, envconfig::Error> {
        ConsumerConfig::set_defaults(DEFAULT_CONSUMER_GROUP, DEFAULT_CONSUMER_TOPIC);
        Self::init_from_env()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}

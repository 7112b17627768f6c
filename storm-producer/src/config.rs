use std::num::ParseIntError;
use std::time::Duration;

use envconfig::Envconfig;

pub use common_kafka::config::KafkaConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(from = "RAW_TOPIC", default = "storm_reports_raw")]
    pub raw_topic: String,

    #[envconfig(
        from = "SPC_BASE_URL",
        default = "https://www.spc.noaa.gov/climo/reports/"
    )]
    pub spc_base_url: String,

    // Unix seconds of the day to fetch. Empty fetches the rolling "today" feeds
    #[envconfig(from = "REPORT_DATE", default = "")]
    pub report_date: String,

    #[envconfig(from = "FETCH_INTERVAL_SECS", default = "86400")]
    pub fetch_interval_secs: u64,

    // Fetch once and exit instead of polling
    #[envconfig(from = "RUN_ONCE", default = "false")]
    pub run_once: bool,

    #[envconfig(from = "HTTP_TIMEOUT_SECS", default = "30")]
    pub http_timeout_secs: u64,

    #[envconfig(from = "MAX_MESSAGE_BYTES", default = "209715200")]
    pub max_message_bytes: usize,

    #[envconfig(from = "PRODUCER_SEND_TIMEOUT_MS", default = "5000")]
    pub producer_send_timeout_ms: u64,

    #[envconfig(from = "BIND_HOST", default = "::")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "3322")]
    pub bind_port: u16,
}

impl Config {
    pub fn report_date(&self) -> Result<Option<i64>, ParseIntError> {
        match self.report_date.trim() {
            "" => Ok(None),
            date => date.parse().map(Some),
        }
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.producer_send_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(overrides: &[(&str, &str)]) -> HashMap<String, String> {
        let mut env = HashMap::from([("KAFKA_HOSTS".to_string(), "kafka:9092".to_string())]);
        for (k, v) in overrides {
            env.insert(k.to_string(), v.to_string());
        }
        env
    }

    #[test]
    fn loads_defaults() {
        let config = Config::init_from_hashmap(&env(&[])).unwrap();

        assert_eq!(config.raw_topic, "storm_reports_raw");
        assert_eq!(config.spc_base_url, "https://www.spc.noaa.gov/climo/reports/");
        assert_eq!(config.report_date().unwrap(), None);
        assert_eq!(config.fetch_interval(), Duration::from_secs(86400));
        assert!(!config.run_once);
        assert_eq!(config.max_message_bytes, 209715200);
        assert_eq!(config.bind_address(), ":::3322");
    }

    #[test]
    fn report_date_must_be_unix_seconds() {
        let config = Config::init_from_hashmap(&env(&[("REPORT_DATE", "1716764227")])).unwrap();
        assert_eq!(config.report_date().unwrap(), Some(1716764227));

        let config = Config::init_from_hashmap(&env(&[("REPORT_DATE", "2024-05-26")])).unwrap();
        assert!(config.report_date().is_err());
    }
}

use common_kafka::message::IncomingMessage;
use serde::Serialize;

/// The record published to the dead-letter topic for a raw message that can never be
/// transformed. `payload` is the raw bytes as (lossy) UTF-8 text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedMessage {
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
    pub error: String,
    pub payload: String,
}

impl RejectedMessage {
    pub fn new(message: &IncomingMessage, error: impl ToString) -> Self {
        let payload = message
            .payload
            .as_deref()
            .map(String::from_utf8_lossy)
            .unwrap_or_default()
            .into_owned();

        Self {
            source_topic: message.topic().to_owned(),
            partition: message.partition_number(),
            offset: message.offset,
            error: error.to_string(),
            payload,
        }
    }

    /// Keyed by source position, so re-rejections of one message stay together.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.source_topic, self.partition, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn serializes_with_source_position() {
        let message = IncomingMessage::new("storm_reports_raw", 3, 17, Some(&b"{\"Time\":\"time\"}"[..]));
        let rejected = RejectedMessage::new(&message, "payload is a header row");

        assert_json_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({
                "sourceTopic": "storm_reports_raw",
                "partition": 3,
                "offset": 17,
                "error": "payload is a header row",
                "payload": "{\"Time\":\"time\"}"
            })
        );
        assert_eq!(rejected.key(), "storm_reports_raw:3:17");
    }

    #[test]
    fn binary_payloads_are_carried_lossily() {
        let message = IncomingMessage::new("storm_reports_raw", 0, 1, Some(&[0xff, b'a'][..]));
        let rejected = RejectedMessage::new(&message, "bad");
        assert_eq!(rejected.payload, "\u{fffd}a");

        let empty = IncomingMessage::new("storm_reports_raw", 0, 2, None);
        assert_eq!(RejectedMessage::new(&empty, "bad").payload, "");
    }
}

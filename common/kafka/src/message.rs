use std::fmt;

use rdkafka::message::BorrowedMessage;
use rdkafka::topic_partition_list::TopicPartitionListElem;
use rdkafka::{Message, TopicPartitionList};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    topic: String,
    partition_number: i32,
}

impl Partition {
    pub fn new(topic: impl Into<String>, partition_number: i32) -> Self {
        Self {
            topic: topic.into(),
            partition_number,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_number(&self) -> i32 {
        self.partition_number
    }

    pub fn from_list(list: &TopicPartitionList) -> Vec<Partition> {
        list.elements().into_iter().map(Partition::from).collect()
    }
}

impl From<TopicPartitionListElem<'_>> for Partition {
    fn from(elem: TopicPartitionListElem<'_>) -> Self {
        Self::new(elem.topic(), elem.partition())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition_number)
    }
}

/// An owned copy of a consumed message, detached from the consumer that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub partition: Partition,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl IncomingMessage {
    pub fn new(topic: &str, partition: i32, offset: i64, payload: Option<&[u8]>) -> Self {
        Self {
            partition: Partition::new(topic, partition),
            offset,
            key: None,
            payload: payload.map(<[u8]>::to_vec),
        }
    }

    pub fn topic(&self) -> &str {
        self.partition.topic()
    }

    pub fn partition_number(&self) -> i32 {
        self.partition.partition_number()
    }

    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl From<&BorrowedMessage<'_>> for IncomingMessage {
    fn from(message: &BorrowedMessage<'_>) -> Self {
        Self {
            partition: Partition::new(message.topic(), message.partition()),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::Offset;

    #[test]
    fn partitions_from_list() {
        let mut list = TopicPartitionList::new();
        list.add_partition_offset("storm_reports_raw", 0, Offset::Beginning)
            .unwrap();
        list.add_partition_offset("storm_reports_raw", 3, Offset::Beginning)
            .unwrap();

        let partitions = Partition::from_list(&list);
        assert_eq!(
            partitions,
            vec![
                Partition::new("storm_reports_raw", 0),
                Partition::new("storm_reports_raw", 3)
            ]
        );
        assert_eq!(partitions[1].to_string(), "storm_reports_raw:3");
    }

    #[test]
    fn message_accessors() {
        let message = IncomingMessage::new("storm_reports_raw", 2, 41, Some(&b"{}"[..]));
        assert_eq!(message.topic(), "storm_reports_raw");
        assert_eq!(message.partition_number(), 2);
        assert_eq!(message.payload_len(), 2);
        assert_eq!(IncomingMessage::new("t", 0, 0, None).payload_len(), 0);
    }
}

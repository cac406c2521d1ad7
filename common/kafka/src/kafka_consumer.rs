use std::sync::Arc;

use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message, Offset, TopicPartitionList,
};
use tracing::debug;

use crate::config::{ConsumerConfig, KafkaConfig};

/// A consumer bound to one topic whose offsets only move when the caller
/// commits a message it has finished with.
#[derive(Clone)]
pub struct SingleTopicConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Message belongs to topic {0}, not to this consumer")]
    ForeignTopic(String),
}

/// An owned copy of a consumed message, detached from the consumer's
/// internal buffers so it can be held across awaits and committed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl ReceivedMessage {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }
}

impl SingleTopicConsumer {
    pub fn new(
        common_config: KafkaConfig,
        consumer_config: ConsumerConfig,
    ) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        common_config.apply(&mut client_config);
        client_config
            .set("group.id", &consumer_config.kafka_consumer_group)
            .set(
                "auto.offset.reset",
                &consumer_config.kafka_consumer_offset_reset,
            )
            .set(
                "enable.auto.commit",
                consumer_config.kafka_consumer_auto_commit.to_string(),
            )
            .set(
                "fetch.min.bytes",
                consumer_config.kafka_consumer_fetch_min_bytes.to_string(),
            )
            .set(
                "max.partition.fetch.bytes",
                consumer_config.kafka_consumer_fetch_max_bytes.to_string(),
            )
            .set(
                "fetch.wait.max.ms",
                consumer_config.kafka_consumer_fetch_wait_max_ms.to_string(),
            );

        debug!("rdkafka consumer configuration: {:?}", client_config);
        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[consumer_config.kafka_consumer_topic.as_str()])?;

        let inner = Inner {
            consumer,
            topic: consumer_config.kafka_consumer_topic,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Wait for the next message. Cancel-safe: dropping the future before it
    /// resolves does not lose a message.
    pub async fn recv(&self) -> Result<ReceivedMessage, RecvErr> {
        let message = self.inner.consumer.recv().await?;

        Ok(ReceivedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: message.payload().map(|payload| payload.to_vec()),
        })
    }

    /// Synchronously commit the position just past `message`, so a restart
    /// resumes with the message after it.
    pub fn commit(&self, message: &ReceivedMessage) -> Result<(), OffsetErr> {
        if message.topic != self.inner.topic {
            return Err(OffsetErr::ForeignTopic(message.topic.clone()));
        }

        let mut list = TopicPartitionList::new();
        list.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.inner.consumer.commit(&list, CommitMode::Sync)?;
        Ok(())
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use common_kafka::kafka_consumer::{OffsetErr, ReceivedMessage, RecvErr, SingleTopicConsumer};
use common_kafka::kafka_producer::{send_keyed_iter_to_kafka, KafkaContext, KafkaProduceError};
use rdkafka::producer::FutureProducer;

use crate::types::{DisciplineEvent, DISCIPLINE_EVENT_NAME};

/// Where control events come from.
#[async_trait]
pub trait MessageReader: Send + Sync {
    async fn fetch(&self) -> Result<ReceivedMessage, RecvErr>;

    async fn commit(&self, message: &ReceivedMessage) -> Result<(), OffsetErr>;
}

/// Where discipline events go. One call is one batch.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    async fn write(&self, events: &[DisciplineEvent]) -> Result<(), KafkaProduceError>;
}

#[async_trait]
impl<T: MessageReader + ?Sized> MessageReader for Arc<T> {
    async fn fetch(&self) -> Result<ReceivedMessage, RecvErr> {
        (**self).fetch().await
    }

    async fn commit(&self, message: &ReceivedMessage) -> Result<(), OffsetErr> {
        (**self).commit(message).await
    }
}

#[async_trait]
impl<T: MessageWriter + ?Sized> MessageWriter for Arc<T> {
    async fn write(&self, events: &[DisciplineEvent]) -> Result<(), KafkaProduceError> {
        (**self).write(events).await
    }
}

#[async_trait]
impl MessageReader for SingleTopicConsumer {
    async fn fetch(&self) -> Result<ReceivedMessage, RecvErr> {
        self.recv().await
    }

    async fn commit(&self, message: &ReceivedMessage) -> Result<(), OffsetErr> {
        SingleTopicConsumer::commit(self, message)
    }
}

pub struct KafkaDisciplineWriter {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaDisciplineWriter {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl MessageWriter for KafkaDisciplineWriter {
    async fn write(&self, events: &[DisciplineEvent]) -> Result<(), KafkaProduceError> {
        send_keyed_iter_to_kafka(
            &self.producer,
            &self.topic,
            |_| Some(DISCIPLINE_EVENT_NAME.to_string()),
            events,
        )
        .await
        .into_iter()
        .collect()
    }
}

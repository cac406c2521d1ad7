use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common_kafka::kafka_consumer::{OffsetErr, ReceivedMessage, RecvErr};
use common_kafka::kafka_producer::KafkaProduceError;
use discipline_importer::bus::{MessageReader, MessageWriter};
use discipline_importer::error::ExtractError;
use discipline_importer::extractor::{DisciplineSource, RawDiscipline, DATE_FORMAT};
use discipline_importer::types::DisciplineEvent;
use futures::stream::{self, BoxStream, StreamExt};
use rdkafka::error::KafkaError;

/// An in-memory legacy store: rows carry their registration date and are
/// filtered the way the real query filters them.
pub struct MemoryStore {
    rows: Vec<(String, i32, String)>,
    pub queries: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<(NaiveDateTime, i32, &str)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(at, id, name)| (at.format(DATE_FORMAT).to_string(), id, name.to_string()))
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DisciplineSource for MemoryStore {
    async fn ping(&self) -> Result<(), ExtractError> {
        Ok(())
    }

    fn disciplines<'a>(
        &'a self,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> BoxStream<'a, Result<RawDiscipline, ExtractError>> {
        let start = start.format(DATE_FORMAT).to_string();
        let end = end.format(DATE_FORMAT).to_string();
        self.queries
            .lock()
            .unwrap()
            .push((start.clone(), end.clone()));

        // The fixed-width format sorts lexically in time order
        stream::iter(
            self.rows
                .iter()
                .filter(move |(at, _, _)| *at >= start && *at <= end)
                .map(|(_, id, name)| {
                    Ok(RawDiscipline {
                        id: *id,
                        name: name.clone(),
                    })
                }),
        )
        .boxed()
    }
}

/// Serves the scripted messages, then reports that nothing else arrived.
pub struct QueueReader {
    messages: Mutex<VecDeque<ReceivedMessage>>,
    pub committed: Mutex<Vec<i64>>,
}

impl QueueReader {
    pub fn new(messages: Vec<ReceivedMessage>) -> Self {
        Self {
            messages: Mutex::new(messages.into()),
            committed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageReader for QueueReader {
    async fn fetch(&self) -> Result<ReceivedMessage, RecvErr> {
        let next = self.messages.lock().unwrap().pop_front();
        next.ok_or(RecvErr::Kafka(KafkaError::NoMessageReceived))
    }

    async fn commit(&self, message: &ReceivedMessage) -> Result<(), OffsetErr> {
        self.committed.lock().unwrap().push(message.offset);
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingWriter {
    pub batches: Mutex<Vec<Vec<DisciplineEvent>>>,
}

#[async_trait]
impl MessageWriter for CollectingWriter {
    async fn write(&self, events: &[DisciplineEvent]) -> Result<(), KafkaProduceError> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

pub fn control_message(offset: i64, key: &str, payload: serde_json::Value) -> ReceivedMessage {
    ReceivedMessage {
        topic: "meta_events".to_string(),
        partition: 0,
        offset,
        key: Some(key.to_string()),
        payload: Some(payload.to_string().into_bytes()),
    }
}

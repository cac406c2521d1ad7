use async_trait::async_trait;
use futures::StreamExt;
use tracing::{info, warn};

use crate::bus::MessageWriter;
use crate::error::ImportError;
use crate::extractor::DisciplineSource;
use crate::metrics_consts::{DISCIPLINES_QUEUED, IMPORTS_COMPLETED, IMPORTS_FAILED};
use crate::publisher::BatchPublisher;
use crate::window::ImportWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// Disciplines handed to the publisher.
    pub queued: usize,
    /// Non-empty flushes attempted.
    pub batches: usize,
}

/// One unit of work: import everything in a window.
#[async_trait]
pub trait Import: Send + Sync {
    async fn import(&self, window: &ImportWindow) -> Result<ImportSummary, ImportError>;
}

pub struct Importer<S, W> {
    source: S,
    writer: W,
    write_threshold: usize,
}

impl<S, W> Importer<S, W> {
    pub fn new(source: S, writer: W, write_threshold: usize) -> Self {
        Self {
            source,
            writer,
            write_threshold,
        }
    }
}

// Keeps the first failure of an import; later ones are only logged.
fn record_error(first: &mut Option<ImportError>, error: ImportError) {
    match first {
        None => *first = Some(error),
        Some(_) => warn!("Import already failed, ignoring later error: {}", error),
    }
}

#[async_trait]
impl<S, W> Import for Importer<S, W>
where
    S: DisciplineSource,
    W: MessageWriter,
{
    async fn import(&self, window: &ImportWindow) -> Result<ImportSummary, ImportError> {
        if let Err(e) = self.source.ping().await {
            metrics::counter!(IMPORTS_FAILED).increment(1);
            return Err(e.into());
        }

        info!(
            start = %window.start,
            end = %window.end,
            year = window.year,
            "Start import"
        );

        let mut publisher = BatchPublisher::new(&self.writer, self.write_threshold);
        let mut first_error = None;
        let mut queued = 0;

        let mut rows = self.source.disciplines(&window.start, &window.end);
        while let Some(row) = rows.next().await {
            let raw = match row {
                Ok(raw) => raw,
                Err(e) => {
                    // The cursor is unusable after a bad row
                    record_error(&mut first_error, e.into());
                    break;
                }
            };

            queued += 1;
            // A failed publish does not stop extraction, so the summary
            // still reflects everything the window held.
            if let Err(e) = publisher.accept(raw.into_event(window.year)).await {
                record_error(&mut first_error, e.into());
            }
        }
        drop(rows);

        if let Err(e) = publisher.flush().await {
            record_error(&mut first_error, e.into());
        }

        let summary = ImportSummary {
            queued,
            batches: publisher.batches(),
        };
        metrics::counter!(DISCIPLINES_QUEUED).increment(queued as u64);

        match first_error {
            None => {
                info!(
                    queued = summary.queued,
                    batches = summary.batches,
                    "Finished import. Error: none"
                );
                metrics::counter!(IMPORTS_COMPLETED).increment(1);
                Ok(summary)
            }
            Some(e) => {
                warn!(
                    queued = summary.queued,
                    batches = summary.batches,
                    "Finished import. Error: {}",
                    e
                );
                metrics::counter!(IMPORTS_FAILED).increment(1);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::{NaiveDate, NaiveDateTime};
    use common_kafka::kafka_producer::KafkaProduceError;
    use futures::stream::{self, BoxStream};

    use super::*;
    use crate::error::{ExtractError, PublishError};
    use crate::extractor::RawDiscipline;
    use crate::types::DisciplineEvent;

    enum Row {
        Ok(i32, &'static str),
        Undecodable,
    }

    struct ScriptedSource {
        reachable: bool,
        rows: Vec<Row>,
        queried: AtomicBool,
    }

    impl ScriptedSource {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                reachable: true,
                rows,
                queried: AtomicBool::new(false),
            }
        }

        fn numbered(ids: std::ops::Range<i32>) -> Self {
            Self::new(ids.map(|id| Row::Ok(id, "  discipline  ")).collect())
        }
    }

    #[async_trait]
    impl DisciplineSource for ScriptedSource {
        async fn ping(&self) -> Result<(), ExtractError> {
            if self.reachable {
                Ok(())
            } else {
                Err(ExtractError::Connectivity(sqlx::Error::PoolTimedOut))
            }
        }

        fn disciplines<'a>(
            &'a self,
            _start: &NaiveDateTime,
            _end: &NaiveDateTime,
        ) -> BoxStream<'a, Result<RawDiscipline, ExtractError>> {
            self.queried.store(true, Ordering::SeqCst);
            stream::iter(self.rows.iter().map(|row| match row {
                Row::Ok(id, name) => Ok(RawDiscipline {
                    id: *id,
                    name: name.to_string(),
                }),
                Row::Undecodable => Err(ExtractError::Decode(sqlx::Error::ColumnNotFound(
                    "id".to_string(),
                ))),
            }))
            .boxed()
        }
    }

    /// Records every batch; fails the calls whose 1-based number is listed.
    #[derive(Default)]
    struct ScriptedWriter {
        batches: Mutex<Vec<Vec<DisciplineEvent>>>,
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl ScriptedWriter {
        fn failing_on(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                ..Default::default()
            }
        }

        fn batches(&self) -> Vec<Vec<DisciplineEvent>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageWriter for ScriptedWriter {
        async fn write(&self, events: &[DisciplineEvent]) -> Result<(), KafkaProduceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.batches.lock().unwrap().push(events.to_vec());
            if self.fail_on.contains(&call) {
                return Err(KafkaProduceError::KafkaProduceCanceled);
            }
            Ok(())
        }
    }

    fn window() -> ImportWindow {
        let at = NaiveDate::from_ymd_opt(2023, 3, 5)
            .unwrap()
            .and_hms_opt(4, 0, 0)
            .unwrap();
        ImportWindow {
            start: at,
            end: at,
            year: 2023,
        }
    }

    #[tokio::test]
    async fn publishes_rows_in_threshold_batches() {
        let importer = Importer::new(ScriptedSource::numbered(10..16), ScriptedWriter::default(), 3);

        let summary = importer.import(&window()).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                queued: 6,
                batches: 2
            }
        );
        let batches = importer.writer.batches();
        let ids: Vec<Vec<i32>> = batches
            .iter()
            .map(|batch| batch.iter().map(|e| e.id).collect())
            .collect();
        assert_eq!(ids, vec![vec![10, 11, 12], vec![13, 14, 15]]);
        assert!(batches
            .iter()
            .flatten()
            .all(|e| e.name == "discipline" && e.year == 2023));
    }

    #[tokio::test]
    async fn empty_window_publishes_nothing() {
        let importer = Importer::new(ScriptedSource::new(vec![]), ScriptedWriter::default(), 3);

        let summary = importer.import(&window()).await.unwrap();

        assert_eq!(summary, ImportSummary::default());
        assert!(importer.writer.batches().is_empty());
    }

    #[tokio::test]
    async fn unreachable_store_is_not_queried() {
        let mut source = ScriptedSource::numbered(10..16);
        source.reachable = false;
        let importer = Importer::new(source, ScriptedWriter::default(), 3);

        let err = importer.import(&window()).await.unwrap_err();

        assert!(matches!(
            err,
            ImportError::Extract(ExtractError::Connectivity(_))
        ));
        assert!(!importer.source.queried.load(Ordering::SeqCst));
        assert!(importer.writer.batches().is_empty());
    }

    #[tokio::test]
    async fn bad_row_stops_extraction_but_flushes_what_came_before() {
        let source = ScriptedSource::new(vec![
            Row::Ok(20, "name test disc"),
            Row::Undecodable,
            Row::Ok(21, "never read"),
        ]);
        let importer = Importer::new(source, ScriptedWriter::default(), 3);

        let err = importer.import(&window()).await.unwrap_err();

        assert!(matches!(err, ImportError::Extract(ExtractError::Decode(_))));
        let batches = importer.writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![DisciplineEvent {
                id: 20,
                name: "name test disc".to_string(),
                year: 2023
            }]
        );
    }

    #[tokio::test]
    async fn failed_publish_is_returned_after_extraction_completes() {
        let importer = Importer::new(
            ScriptedSource::numbered(1..21),
            ScriptedWriter::failing_on(vec![3]),
            3,
        );

        let err = importer.import(&window()).await.unwrap_err();

        assert!(matches!(
            err,
            ImportError::Publish(PublishError { batch_size: 3, .. })
        ));
        let handed_over: usize = importer.writer.batches().iter().map(Vec::len).sum();
        assert_eq!(handed_over, 20);
    }

    #[tokio::test]
    async fn first_error_wins_over_later_publish_failure() {
        let source = ScriptedSource::new(vec![
            Row::Ok(1, "a"),
            Row::Ok(2, "b"),
            Row::Undecodable,
        ]);
        let importer = Importer::new(source, ScriptedWriter::failing_on(vec![1]), 3);

        let err = importer.import(&window()).await.unwrap_err();

        assert!(matches!(err, ImportError::Extract(ExtractError::Decode(_))));
        assert_eq!(importer.writer.batches().len(), 1);
    }

    #[tokio::test]
    async fn first_publish_failure_wins_over_later_ones() {
        let importer = Importer::new(
            ScriptedSource::numbered(0..5),
            ScriptedWriter::failing_on(vec![1, 3]),
            2,
        );

        let err = importer.import(&window()).await.unwrap_err();

        // Batches are [2, 2, 1]; only the first failure is reported
        assert!(matches!(
            err,
            ImportError::Publish(PublishError { batch_size: 2, .. })
        ));
        assert_eq!(importer.writer.batches().len(), 3);
    }
}

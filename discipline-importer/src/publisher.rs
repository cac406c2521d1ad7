use tracing::{error, info};

use crate::bus::MessageWriter;
use crate::error::PublishError;
use crate::metrics_consts::{BATCHES_PUBLISHED, PUBLISH_FAILURES};
use crate::types::DisciplineEvent;

pub const DEFAULT_WRITE_THRESHOLD: usize = 100;

/// Accumulates discipline events and hands them to the writer in batches of
/// `threshold`. A publisher lives for one import; whatever is pending when
/// the rows run out goes out with the final `flush`.
pub struct BatchPublisher<'a, W: ?Sized> {
    writer: &'a W,
    threshold: usize,
    pending: Vec<DisciplineEvent>,
    batches: usize,
}

impl<'a, W: MessageWriter + ?Sized> BatchPublisher<'a, W> {
    pub fn new(writer: &'a W, threshold: usize) -> Self {
        // A threshold of zero would never fill; treat it as "send each event"
        let threshold = threshold.max(1);
        Self {
            writer,
            threshold,
            pending: Vec::with_capacity(threshold),
            batches: 0,
        }
    }

    /// Queue one event, flushing first if that fills the batch.
    pub async fn accept(&mut self, event: DisciplineEvent) -> Result<(), PublishError> {
        self.pending.push(event);
        if self.pending.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send everything pending in one writer call. The batch is dropped even
    /// when the write fails; nothing is retried here.
    pub async fn flush(&mut self) -> Result<(), PublishError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.pending);
        self.batches += 1;
        let result = self.writer.write(&batch).await;
        info!(
            batch = self.batches,
            size = batch.len(),
            ok = result.is_ok(),
            "Flushed discipline batch"
        );

        match result {
            Ok(()) => {
                metrics::counter!(BATCHES_PUBLISHED).increment(1);
                Ok(())
            }
            Err(source) => {
                error!(size = batch.len(), "Failed to publish discipline batch: {}", source);
                metrics::counter!(PUBLISH_FAILURES).increment(1);
                Err(PublishError {
                    batch_size: batch.len(),
                    source,
                })
            }
        }
    }

    /// Number of non-empty flushes attempted so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

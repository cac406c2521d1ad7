use chrono::Local;
use tokio::sync::watch;
use tracing::info;

use crate::bus::MessageReader;
use crate::error::EventLoopError;
use crate::importer::Import;
use crate::metrics_consts::OFFSETS_COMMITTED;
use crate::window::resolve_window;

/// Consumes control events one at a time: resolve a window, import it,
/// commit. A message's offset is committed only once its import succeeded,
/// so a failed import is redelivered after restart.
pub struct EventLoop<R, I> {
    reader: R,
    importer: I,
    shutdown: watch::Receiver<bool>,
}

impl<R, I> EventLoop<R, I>
where
    R: MessageReader,
    I: Import,
{
    pub fn new(reader: R, importer: I, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            reader,
            importer,
            shutdown,
        }
    }

    /// Run until a stage fails or shutdown is requested while waiting for
    /// the next message. Never returns `Ok`.
    pub async fn run(&mut self) -> Result<(), EventLoopError> {
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => {
                    info!("Shutdown requested, stop consuming control events");
                    return Err(EventLoopError::Cancelled);
                }
                fetched = self.reader.fetch() => fetched?,
            };

            info!(
                topic = message.topic,
                partition = message.partition,
                offset = message.offset,
                key = message.key(),
                "Received control event"
            );

            match resolve_window(message.key(), message.payload.as_deref(), Local::now()) {
                Some(window) => {
                    self.importer.import(&window).await?;
                }
                None => info!("Zero start time, skip event {}", message.key()),
            }

            self.reader.commit(&message).await?;
            metrics::counter!(OFFSETS_COMMITTED).increment(1);
        }
    }
}

// Resolves once shutdown is flagged. A dropped sender can never flag it, so
// in that case this never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

//! Render worker behind a bounded queue.
//!
//! The engine hands media to a [`RenderQueue`] without ever waiting; a single
//! worker task drains the queue and calls the renderer one item at a time.

use kernel_console_core::{MediaSink, RenderableMedia};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::viewer::MediaRenderer;

/// Unit of work for the render worker.
#[derive(Debug)]
pub enum RenderJob {
    /// Render one media item.
    Render(RenderableMedia),
    /// Finish the queued work and exit.
    Stop,
}

/// Engine-facing handle of the render queue.
#[derive(Debug, Clone)]
pub struct RenderQueue {
    tx: mpsc::Sender<RenderJob>,
}

impl MediaSink for RenderQueue {
    fn render(&mut self, media: RenderableMedia) {
        match self.tx.try_send(RenderJob::Render(media)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Render queue full; dropping media item");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Render worker stopped; dropping media item");
            }
        }
    }
}

/// Background task that owns the renderer.
pub struct RenderWorker {
    tx: mpsc::Sender<RenderJob>,
    handle: JoinHandle<()>,
}

impl RenderWorker {
    /// Spawn a worker with a queue of `capacity` items.
    #[must_use]
    pub fn spawn<R>(renderer: R, capacity: usize) -> (RenderQueue, Self)
    where
        R: MediaRenderer + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    RenderJob::Render(media) => {
                        if let Err(e) = renderer.render(&media).await {
                            tracing::warn!(
                                error = %e,
                                mime = media.kind.mime(),
                                "Media render failed"
                            );
                        }
                    }
                    RenderJob::Stop => break,
                }
            }
            tracing::debug!("Render worker exiting");
        });

        let queue = RenderQueue { tx: tx.clone() };
        (queue, Self { tx, handle })
    }

    /// Stop the worker after the items already queued.
    pub async fn stop(self) {
        if self.tx.send(RenderJob::Stop).await.is_err() {
            tracing::debug!("Render worker already gone");
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Render worker panicked");
        }
    }
}

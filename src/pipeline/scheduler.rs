//! Single-worker processing scheduler.
//!
//! Uploads enqueue by inserting a `pending` row and nudging the wake
//! channel. The scheduler drains the queue one track at a time, oldest
//! first, so at most one ffmpeg/audiowaveform chain runs at once. A
//! periodic tick backs up the wake channel in case a nudge is lost.

use super::processor::PipelineRunner;
use crate::library::LibraryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fallback queue check interval when no wake-up arrives.
    pub poll_interval: Duration,
    /// Pause between consecutive tracks within one drain.
    pub rest_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            rest_delay: Duration::from_millis(100),
        }
    }
}

/// Cloneable handle for nudging the scheduler after an enqueue.
#[derive(Clone)]
pub struct SchedulerHandle {
    wake_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Signal that new pending work exists. Wake-ups coalesce on a
    /// capacity-1 channel; one drain covers any number of signals.
    pub fn enqueue(&self) {
        let _ = self.wake_tx.try_send(());
    }
}

pub struct ProcessingScheduler {
    store: Arc<dyn LibraryStore>,
    processor: Arc<dyn PipelineRunner>,
    config: SchedulerConfig,
    wake_rx: mpsc::Receiver<()>,
}

impl ProcessingScheduler {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        processor: Arc<dyn PipelineRunner>,
        config: SchedulerConfig,
    ) -> (Self, SchedulerHandle) {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        (
            Self {
                store,
                processor,
                config,
                wake_rx,
            },
            SchedulerHandle { wake_tx },
        )
    }

    /// Main scheduler loop. Returns when the shutdown token fires; a
    /// track mid-pipeline finishes first.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting processing scheduler");

        // Tracks stuck in `processing` from an interrupted run go back to
        // the queue before anything new is picked up.
        match self.store.reset_processing_tracks() {
            Ok(count) if count > 0 => {
                warn!("Requeued {} tracks interrupted by a previous shutdown", count);
            }
            Ok(_) => {}
            Err(e) => error!("Failed to requeue interrupted tracks: {}", e),
        }

        loop {
            self.drain_queue(&shutdown).await;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Processing scheduler received shutdown signal");
                    break;
                }
                Some(()) = self.wake_rx.recv() => {
                    debug!("Scheduler woken by enqueue");
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Processing scheduler stopped");
    }

    /// Process pending tracks until the queue is empty.
    async fn drain_queue(&self, shutdown: &CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            let track = match self.store.oldest_pending_track() {
                Ok(Some(track)) => track,
                Ok(None) => return,
                Err(e) => {
                    error!("Failed to poll for pending tracks: {}", e);
                    return;
                }
            };

            debug!("Picked up track {} for processing", track.id);
            if let Err(e) = self.processor.process(&track.id).await {
                error!(
                    "Could not record processing outcome for track {}: {}",
                    track.id, e
                );
            }

            tokio::time::sleep(self.config.rest_delay).await;
        }
    }
}

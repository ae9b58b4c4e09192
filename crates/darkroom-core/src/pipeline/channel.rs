//! Bounded event channel for long-running listeners.

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::processor::Pipeline;
use crate::config::PipelineConfig;
use crate::types::{EventOutcome, ObjectEvent};

/// Create a bounded channel pair with the configured buffer size.
///
/// When the buffer is full the sender waits, so a fast notification source
/// cannot queue unbounded work ahead of the stages.
pub fn bounded_channel<T>(config: &PipelineConfig) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(config.buffer_size.max(1))
}

/// Pulls notifications off a channel, runs them through a [`Pipeline`] and
/// pushes every outcome downstream.
pub struct EventStage {
    input: mpsc::Receiver<ObjectEvent>,
    output: mpsc::Sender<EventOutcome>,
    parallel_workers: usize,
}

impl EventStage {
    pub fn new(
        input: mpsc::Receiver<ObjectEvent>,
        output: mpsc::Sender<EventOutcome>,
        parallel_workers: usize,
    ) -> Self {
        Self {
            input,
            output,
            parallel_workers: parallel_workers.max(1),
        }
    }

    /// Run until the input closes or the downstream receiver is dropped.
    pub async fn run(self, pipeline: Arc<Pipeline>) {
        let Self {
            input,
            output,
            parallel_workers,
        } = self;

        let events = stream::unfold(input, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        let mut outcomes = std::pin::pin!(events
            .map(|event| {
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.handle(&event).await }
            })
            .buffer_unordered(parallel_workers));

        while let Some(batch) = outcomes.next().await {
            for outcome in batch {
                if output.send(outcome).await.is_err() {
                    tracing::debug!("listener: downstream closed, stopping");
                    return;
                }
            }
        }
    }
}

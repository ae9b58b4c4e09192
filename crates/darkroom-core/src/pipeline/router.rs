//! Local stand-in for the external event router.
//!
//! Dispatches seed notifications, then feeds every object a stage reports as
//! created back in as a new notification, until no watched namespace
//! receives anything new. Lets a single process reproduce the full
//! upload -> canonical -> derived fan-out against a local store.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::processor::Pipeline;
use crate::types::{EventOutcome, ObjectEvent};

/// Drives a [`Pipeline`] to quiescence with bounded concurrency.
pub struct LocalRouter {
    pipeline: Arc<Pipeline>,
    parallel_workers: usize,
    /// Deliver every event twice, to exercise at-least-once handling
    redeliver: bool,
}

impl LocalRouter {
    pub fn new(pipeline: Arc<Pipeline>, parallel_workers: usize) -> Self {
        Self {
            pipeline,
            parallel_workers: parallel_workers.max(1),
            redeliver: false,
        }
    }

    pub fn with_redelivery(mut self, redeliver: bool) -> Self {
        self.redeliver = redeliver;
        self
    }

    /// Process `seed` and everything it transitively creates.
    pub async fn run(&self, seed: Vec<ObjectEvent>) -> Vec<EventOutcome> {
        let store_name = self.pipeline.store().name().to_string();
        let mut queue: VecDeque<ObjectEvent> = VecDeque::new();
        for event in seed {
            self.enqueue(&mut queue, event);
        }

        let mut tasks: JoinSet<Vec<EventOutcome>> = JoinSet::new();
        let mut outcomes = Vec::new();

        loop {
            while tasks.len() < self.parallel_workers {
                let Some(event) = queue.pop_front() else {
                    break;
                };
                let pipeline = Arc::clone(&self.pipeline);
                tasks.spawn(async move { pipeline.handle(&event).await });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            match joined {
                Ok(batch) => {
                    for outcome in &batch {
                        if let EventOutcome::Report(report) = outcome {
                            if let Some(created) = report.created() {
                                if !Pipeline::stages_watching(created.namespace).is_empty() {
                                    tracing::debug!("router: {} -> next stage", created);
                                    self.enqueue(
                                        &mut queue,
                                        ObjectEvent::new(store_name.as_str(), &created),
                                    );
                                }
                            }
                        }
                    }
                    outcomes.extend(batch);
                }
                Err(e) => tracing::error!("router: worker task failed: {}", e),
            }
        }

        outcomes
    }

    fn enqueue(&self, queue: &mut VecDeque<ObjectEvent>, event: ObjectEvent) {
        if self.redeliver {
            queue.push_back(event.clone());
        }
        queue.push_back(event);
    }
}

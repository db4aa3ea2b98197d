//! In-memory [`EventPublisher`] used by orchestrator-level tests.

use std::sync::Mutex;

use async_trait::async_trait;
use syncwave_model::BatchChangeEvent;

use crate::publisher::{EventPublisher, PublishOutcome};

#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<BatchChangeEvent>>,
    next_outcome: Mutex<Option<PublishOutcome>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next `publish` call to return this outcome instead of
    /// `Delivered`, for exercising the circuit-open/buffered path without a
    /// real breaker.
    pub fn force_next_outcome(&self, outcome: PublishOutcome) {
        *self.next_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn published(&self) -> Vec<BatchChangeEvent> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn publish(&self, event: BatchChangeEvent) -> PublishOutcome {
        let forced = self.next_outcome.lock().unwrap().take();
        self.published.lock().unwrap().push(event);
        forced.unwrap_or(PublishOutcome::Delivered)
    }
}

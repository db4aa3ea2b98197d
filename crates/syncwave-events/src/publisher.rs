use std::time::Duration;

use async_trait::async_trait;
use syncwave_model::BatchChangeEvent;
use tokio::sync::Mutex;

use crate::circuit_breaker::{Admission, CircuitBreaker};
use crate::spill::SpillLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Buffered,
    Dropped,
}

/// Fire-and-forget surface from the orchestrator's perspective: a publish
/// failure only changes this component's internal circuit state, never the
/// caller's. The logical topic is `content-batch-updated`; partition key
/// (where the transport supports one) is `batchId`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: BatchChangeEvent) -> PublishOutcome;
}

/// Posts a [`BatchChangeEvent`] to an HTTP-wrapped bus endpoint. The bus
/// itself is a logical client per the spec — the HTTP wrapping is the
/// chosen transport, not part of the contract.
pub struct HttpEventPublisher {
    client: reqwest::Client,
    endpoint: String,
    send_timeout: Duration,
    breaker: Mutex<CircuitBreaker>,
    spill: SpillLog,
}

impl HttpEventPublisher {
    pub fn new(
        endpoint: impl Into<String>,
        send_timeout: Duration,
        cb_threshold: u32,
        cb_open: Duration,
        spill_capacity: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            send_timeout,
            breaker: Mutex::new(CircuitBreaker::new(cb_threshold, cb_open)),
            spill: SpillLog::new(spill_capacity),
        }
    }

    pub fn spill_len(&self) -> usize {
        self.spill.len()
    }

    pub fn spill_dropped_total(&self) -> u64 {
        self.spill.dropped_total()
    }

    /// Buffers `event` in the spill log, or reports it dropped if the log is
    /// already full.
    fn spill_or_drop(&self, event: BatchChangeEvent) -> PublishOutcome {
        if self.spill.try_push(event) {
            PublishOutcome::Buffered
        } else {
            PublishOutcome::Dropped
        }
    }

    async fn send(&self, event: &BatchChangeEvent) -> Result<(), crate::error::PublishError> {
        let response = tokio::time::timeout(
            self.send_timeout,
            self.client.post(&self.endpoint).json(event).send(),
        )
        .await
        .map_err(|_| crate::error::PublishError::Timeout(self.send_timeout))?
        .map_err(|e| crate::error::PublishError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(crate::error::PublishError::SendFailed(format!(
                "bus returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, event: BatchChangeEvent) -> PublishOutcome {
        let admission = self.breaker.lock().await.admit();
        if admission == Admission::Rejected {
            tracing::warn!(batch_id = %event.batch_id, "publisher circuit open, buffering event");
            return self.spill_or_drop(event);
        }

        match self.send(&event).await {
            Ok(()) => {
                self.breaker.lock().await.record_success();
                PublishOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(batch_id = %event.batch_id, error = %e, "publish failed, buffering event");
                self.breaker.lock().await.record_failure();
                self.spill_or_drop(event)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use syncwave_model::EventChangeType;
    use uuid::Uuid;

    fn event() -> BatchChangeEvent {
        BatchChangeEvent::new(
            Uuid::new_v4(),
            vec!["a".to_string()],
            EventChangeType::Created,
            Some("p1".into()),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn unreachable_endpoint_buffers_rather_than_errors() {
        let publisher = HttpEventPublisher::new(
            "http://127.0.0.1:1/nonexistent",
            Duration::from_millis(200),
            3,
            Duration::from_secs(30),
            16,
        );
        let outcome = publisher.publish(event()).await;
        assert_eq!(outcome, PublishOutcome::Buffered);
        assert_eq!(publisher.spill_len(), 1);
    }

    #[tokio::test]
    async fn circuit_opens_after_trailing_failures_and_buffers_without_sending() {
        let publisher = HttpEventPublisher::new(
            "http://127.0.0.1:1/nonexistent",
            Duration::from_millis(50),
            1,
            Duration::from_secs(30),
            16,
        );
        for _ in 0..3 {
            publisher.publish(event()).await;
        }
        assert!(publisher.spill_len() >= 2);
    }

    #[tokio::test]
    async fn publish_reports_dropped_once_the_spill_log_is_full() {
        let publisher = HttpEventPublisher::new(
            "http://127.0.0.1:1/nonexistent",
            Duration::from_millis(50),
            1,
            Duration::from_secs(30),
            2,
        );
        for _ in 0..2 {
            assert_eq!(publisher.publish(event()).await, PublishOutcome::Buffered);
        }
        assert_eq!(publisher.publish(event()).await, PublishOutcome::Dropped);
        assert_eq!(publisher.spill_len(), 2);
        assert_eq!(publisher.spill_dropped_total(), 1);
    }
}

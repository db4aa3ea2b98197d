use std::collections::VecDeque;
use std::sync::Mutex;

use syncwave_model::BatchChangeEvent;

/// Bounded local buffer for events the publisher couldn't deliver while the
/// circuit is open. When full, the incoming event is rejected (not the
/// oldest buffered one evicted) and a counter is incremented so the drop is
/// observable rather than silent.
pub struct SpillLog {
    capacity: usize,
    entries: Mutex<VecDeque<BatchChangeEvent>>,
    dropped: std::sync::atomic::AtomicU64,
}

impl SpillLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            dropped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Buffers `event` unless the log is already at capacity, in which case
    /// the event is rejected and `false` is returned for the caller to treat
    /// as a drop.
    pub fn try_push(&self, event: BatchChangeEvent) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity {
            let dropped = self.dropped.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            tracing::warn!(dropped_total = dropped, batch_id = %event.batch_id, "spill log full, dropping event");
            return false;
        }
        entries.push_back(event);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn drain(&self) -> Vec<BatchChangeEvent> {
        self.entries.lock().unwrap().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use syncwave_model::EventChangeType;
    use uuid::Uuid;

    fn event(id: &str) -> BatchChangeEvent {
        BatchChangeEvent::new(
            Uuid::new_v4(),
            vec![id.to_string()],
            EventChangeType::Created,
            Some("p1".into()),
            Utc::now(),
        )
    }

    #[test]
    fn rejects_the_incoming_event_once_capacity_is_reached() {
        let log = SpillLog::new(2);
        assert!(log.try_push(event("a")));
        assert!(log.try_push(event("b")));
        assert!(!log.try_push(event("c")));
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped_total(), 1);
        let drained = log.drain();
        assert_eq!(drained[0].content_ids, vec!["a".to_string()]);
        assert_eq!(drained[1].content_ids, vec!["b".to_string()]);
    }
}

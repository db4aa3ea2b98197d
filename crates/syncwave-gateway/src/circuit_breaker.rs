use std::time::{Duration, Instant};

/// Closed → (K consecutive failures) → Open → (after D) → HalfOpen →
/// (probe success) → Closed | (probe failure) → Open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Per-provider circuit breaker. Not thread-safe on its own — the gateway
/// wraps one of these per provider behind a `tokio::sync::Mutex` so state
/// survives across cycles without being touched concurrently.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    threshold: u32,
    open_duration: Duration,
}

/// What the caller should do next, decided before a request is attempted.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Proceed with a normal call.
    Allowed,
    /// Proceed, but this is the single half-open probe; its outcome decides
    /// whether the circuit closes or reopens.
    Probe,
    /// Do not call the provider; the circuit is open and the hold period
    /// has not elapsed.
    Rejected,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            opened_at: None,
            threshold,
            open_duration,
        }
    }

    /// Call before attempting a request. May transition Open → HalfOpen as a
    /// side effect if the hold duration has elapsed.
    pub fn admit(&mut self) -> Admission {
        match self.state {
            State::Closed => Admission::Allowed,
            State::HalfOpen => Admission::Probe,
            State::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.open_duration {
                    self.state = State::HalfOpen;
                    Admission::Probe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.state = State::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        match self.state {
            State::HalfOpen => self.open(),
            State::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.threshold {
                    self.open();
                }
            }
            State::Open => {}
        }
    }

    fn open(&mut self) {
        self.state = State::Open;
        self.opened_at = Some(Instant::now());
    }

    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }
}

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeoutState {
    Pending,
    Fired,
    Cancelled,
}

/// A one-shot timeout checked once per display refresh.
///
/// Each poll compares wall-clock time against the start, so a late refresh
/// never pushes later timeouts back. Overshoot is at most one refresh.
#[derive(Debug, Clone)]
pub struct RequestTimeout {
    start: Instant,
    delay: Duration,
    state: TimeoutState,
}

impl RequestTimeout {
    pub fn new(start: Instant, delay: Duration) -> Self {
        Self {
            start,
            delay,
            state: TimeoutState::Pending,
        }
    }

    /// `true` exactly once, on the first poll at least `delay` after start.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.state != TimeoutState::Pending {
            return false;
        }
        if now.saturating_duration_since(self.start) >= self.delay {
            self.state = TimeoutState::Fired;
            return true;
        }
        false
    }

    pub fn cancel(&mut self) {
        if self.state == TimeoutState::Pending {
            self.state = TimeoutState::Cancelled;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == TimeoutState::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn fires_once_after_delay() {
        let start = Instant::now();
        let mut timeout = RequestTimeout::new(start, DELAY);

        assert!(!timeout.poll(start));
        assert!(!timeout.poll(start + Duration::from_millis(99)));
        assert!(timeout.poll(start + Duration::from_millis(116)));
        assert!(!timeout.poll(start + Duration::from_millis(200)));
        assert!(!timeout.is_pending());
    }

    #[test]
    fn fires_at_exact_delay() {
        let start = Instant::now();
        let mut timeout = RequestTimeout::new(start, DELAY);
        assert!(timeout.poll(start + DELAY));
    }

    #[test]
    fn cancelled_never_fires() {
        let start = Instant::now();
        let mut timeout = RequestTimeout::new(start, DELAY);
        timeout.cancel();
        assert!(!timeout.is_pending());
        assert!(!timeout.poll(start + DELAY * 10));
    }

    #[test]
    fn clock_before_start_does_not_fire() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut timeout = RequestTimeout::new(start, Duration::from_millis(10));
        assert!(!timeout.poll(start - Duration::from_millis(500)));
        assert!(timeout.poll(start + Duration::from_millis(10)));
    }
}

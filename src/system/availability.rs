use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Tracks whether an external tool is usable, with a backoff before it is
/// tried again after a failure.
#[derive(Debug)]
pub struct RetryableAvailability {
    available: AtomicBool,
    retry_at: Mutex<Option<Instant>>,
    backoff: Duration,
}

impl RetryableAvailability {
    pub fn new(initially_available: bool, backoff: Duration) -> Self {
        let retry_at = if initially_available {
            None
        } else {
            Some(Instant::now() + backoff)
        };
        Self {
            available: AtomicBool::new(initially_available),
            retry_at: Mutex::new(retry_at),
            backoff,
        }
    }

    pub fn current(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Returns `(should_attempt, retrying_after_backoff)`.
    pub fn try_acquire(&self) -> (bool, bool) {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> (bool, bool) {
        if self.current() {
            return (true, false);
        }

        let Ok(mut retry_at) = self.retry_at.lock() else {
            return (false, false);
        };
        match *retry_at {
            Some(deadline) if now >= deadline => {
                *retry_at = None;
                self.available.store(true, Ordering::Relaxed);
                (true, true)
            }
            _ => (false, false),
        }
    }

    /// Returns true when this call changed the state.
    pub fn mark_available(&self) -> bool {
        if let Ok(mut retry_at) = self.retry_at.lock() {
            *retry_at = None;
        }
        !self.available.swap(true, Ordering::Relaxed)
    }

    /// Returns true when this call changed the state.
    pub fn mark_unavailable(&self) -> bool {
        self.mark_unavailable_at(Instant::now())
    }

    fn mark_unavailable_at(&self, now: Instant) -> bool {
        if let Ok(mut retry_at) = self.retry_at.lock() {
            *retry_at = Some(now + self.backoff);
        }
        self.available.swap(false, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_reported_once_and_retried_after_backoff() {
        let availability = RetryableAvailability::new(true, Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(availability.mark_unavailable_at(t0));
        assert!(!availability.mark_unavailable_at(t0));
        assert_eq!(availability.try_acquire_at(t0 + Duration::from_secs(5)), (false, false));
        assert_eq!(availability.try_acquire_at(t0 + Duration::from_secs(10)), (true, true));
        assert_eq!(availability.try_acquire_at(t0 + Duration::from_secs(11)), (true, false));
    }

    #[test]
    fn mark_available_reports_transition() {
        let availability = RetryableAvailability::new(false, Duration::from_secs(10));
        assert!(availability.mark_available());
        assert!(!availability.mark_available());
        assert!(availability.current());
    }
}

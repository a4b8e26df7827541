use std::time::{Duration, Instant};

/// Token bucket state for a single key.
///
/// Refills lazily: every `try_take` first credits `elapsed × rate` tokens,
/// capped at capacity, then spends one if available.
#[derive(Debug, Clone)]
pub struct Bucket {
    tokens: f64,
    last: Instant,
}

impl Bucket {
    /// Create a full bucket.
    pub fn full(capacity: f64, now: Instant) -> Self {
        Bucket {
            tokens: capacity,
            last: now,
        }
    }

    /// Refill for the time elapsed since the last touch.
    ///
    /// The timestamp always advances to `now`, even if nothing was added.
    #[inline]
    pub fn refill(&mut self, rate: f64, capacity: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last = now;
    }

    /// Refill, then spend one token if available.
    #[inline]
    pub fn try_take(&mut self, rate: f64, capacity: f64, now: Instant) -> bool {
        self.refill(rate, capacity, now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token count.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Returns true if untouched for longer than `idle`.
    #[inline]
    pub fn is_idle(&self, idle: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last) > idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_until_empty() {
        let now = Instant::now();
        let mut b = Bucket::full(2.0, now);

        assert!(b.try_take(1.0, 2.0, now));
        assert!(b.try_take(1.0, 2.0, now));
        assert!(!b.try_take(1.0, 2.0, now));
        assert_eq!(b.tokens(), 0.0);
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let start = Instant::now();
        let mut b = Bucket::full(3.0, start);
        b.try_take(10.0, 3.0, start);

        b.refill(10.0, 3.0, start + Duration::from_secs(60));
        assert_eq!(b.tokens(), 3.0);
    }

    #[test]
    fn test_fractional_refill_accumulates() {
        let start = Instant::now();
        let mut b = Bucket::full(1.0, start);
        assert!(b.try_take(4.0, 1.0, start));

        // Four quarter-token refills add up to one whole token
        let mut t = start;
        for _ in 0..3 {
            t += Duration::from_millis(62);
            assert!(!b.try_take(4.0, 1.0, t));
        }
        t += Duration::from_millis(70);
        assert!(b.try_take(4.0, 1.0, t));
    }

    #[test]
    fn test_denied_take_leaves_tokens() {
        let start = Instant::now();
        let mut b = Bucket::full(1.0, start);
        b.try_take(2.0, 1.0, start);

        let t = start + Duration::from_millis(250);
        assert!(!b.try_take(2.0, 1.0, t));
        assert!((b.tokens() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_idle() {
        let start = Instant::now();
        let b = Bucket::full(1.0, start);

        assert!(!b.is_idle(Duration::from_secs(5), start + Duration::from_secs(5)));
        assert!(b.is_idle(Duration::from_secs(5), start + Duration::from_secs(6)));
    }
}

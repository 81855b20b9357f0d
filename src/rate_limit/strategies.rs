use crate::clock::{Clock, MonotonicClock};
use crate::rate_limit::{RateLimitError, RateLimiter, Reservation};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A token bucket.
///
/// Replenishes at `rate` tokens per second up to `capacity`. State is stored lazily as the token
/// level at the last reservation; the current level is computed on demand and always lies in
/// `[0, capacity]`. A reservation that has to wait empties the bucket at its `ready_at`, so
/// later callers queue behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    last_tokens: f64,
    last_time: Duration,
}

impl TokenBucket {
    /// Full bucket whose clock starts at zero.
    ///
    /// `rate` may be `f64::INFINITY` to disable limiting while keeping the capacity check.
    pub fn new(rate: f64, capacity: f64) -> Result<Self, RateLimitError> {
        Self::with_state(rate, capacity, capacity, Duration::ZERO)
    }

    /// Bucket holding `tokens` (clamped to `capacity`) as of clock reading `at`.
    ///
    /// `tokens` must not be negative.
    pub fn with_state(
        rate: f64,
        capacity: f64,
        tokens: f64,
        at: Duration,
    ) -> Result<Self, RateLimitError> {
        if rate.is_nan() || rate <= 0.0 {
            return Err(RateLimitError::InvalidRate(rate));
        }
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(RateLimitError::InvalidCapacity(capacity));
        }
        if tokens.is_nan() || tokens < 0.0 {
            return Err(RateLimitError::InvalidTokens(tokens));
        }
        Ok(Self { rate, capacity, last_tokens: tokens.min(capacity), last_time: at })
    }

    /// Tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum level.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens available at clock reading `now`. Zero until a pending reservation is due.
    pub fn available(&self, now: Duration) -> f64 {
        if self.rate.is_infinite() {
            return self.capacity;
        }
        let elapsed = now.saturating_sub(self.last_time).as_secs_f64();
        (self.last_tokens + elapsed * self.rate).min(self.capacity)
    }

    /// Reserve `tokens` at clock reading `now`.
    ///
    /// Scheduling starts at the later of `now` and the last reservation, so a clock reading that
    /// goes backwards counts as no time passing. `wait` is measured from `now`.
    pub fn reserve(&mut self, now: Duration, tokens: f64) -> Result<Reservation, RateLimitError> {
        if !tokens.is_finite() || tokens < 0.0 {
            return Err(RateLimitError::InvalidTokens(tokens));
        }
        if tokens > self.capacity {
            return Err(RateLimitError::ExceedsCapacity {
                requested: tokens,
                capacity: self.capacity,
            });
        }

        let start = now.max(self.last_time);
        if self.rate.is_infinite() {
            self.last_tokens = self.capacity;
            self.last_time = start;
            return Ok(Reservation { ready_at: start, tokens, wait: Duration::ZERO });
        }

        let available = self.available(start);
        let ready_at = if available >= tokens {
            self.last_tokens = available - tokens;
            self.last_time = start;
            start
        } else {
            let secs = (tokens - available) / self.rate;
            let ready_at =
                start.saturating_add(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX));
            self.last_tokens = 0.0;
            self.last_time = ready_at;
            ready_at
        };
        Ok(Reservation { ready_at, tokens, wait: ready_at.saturating_sub(now) })
    }
}

/// A [`TokenBucket`] shared between callers.
///
/// Clones share the same bucket. The lock is held only while the reservation is computed.
#[derive(Debug, Clone)]
pub struct TokenBucketLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    /// Full bucket on the monotonic clock.
    pub fn new(rate: f64, capacity: f64) -> Result<Self, RateLimitError> {
        Self::with_clock(rate, capacity, MonotonicClock::default())
    }

    /// `rate` calls per second with a burst of the same size.
    pub fn per_second(rate: f64) -> Result<Self, RateLimitError> {
        Self::new(rate, rate)
    }

    /// Full bucket on a custom clock (use `ManualClock` in tests).
    pub fn with_clock(
        rate: f64,
        capacity: f64,
        clock: impl Clock + 'static,
    ) -> Result<Self, RateLimitError> {
        let bucket = TokenBucket::with_state(rate, capacity, capacity, clock.now())?;
        Ok(Self::from_bucket(bucket, clock))
    }

    /// Wrap an existing bucket; its `last_time` must be a reading of `clock`.
    pub fn from_bucket(bucket: TokenBucket, clock: impl Clock + 'static) -> Self {
        Self { bucket: Arc::new(Mutex::new(bucket)), clock: Arc::new(clock) }
    }

    /// Copy of the current bucket state.
    pub fn snapshot(&self) -> TokenBucket {
        self.bucket.lock().clone()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn reserve(&self, tokens: f64) -> Result<Reservation, RateLimitError> {
        let now = self.clock.now();
        self.bucket.lock().reserve(now, tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn empty_bucket_schedules_by_rate() {
        let mut bucket = TokenBucket::with_state(1.0, 10.0, 0.0, Duration::ZERO).unwrap();

        let first = bucket.reserve(secs(10.0), 5.0).unwrap();
        assert_eq!(first.ready_at, secs(10.0));
        assert!(first.is_immediate());

        let second = bucket.reserve(secs(10.0), 10.0).unwrap();
        assert_eq!(second.ready_at, secs(15.0));
        assert_eq!(second.wait, secs(5.0));
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let mut bucket = TokenBucket::new(2.0, 4.0).unwrap();
        bucket.reserve(Duration::ZERO, 4.0).unwrap();
        assert_eq!(bucket.available(secs(100.0)), 4.0);
        assert!(bucket.reserve(secs(100.0), 4.0).unwrap().is_immediate());
    }

    #[test]
    fn pending_reservations_queue_later_callers() {
        let mut bucket = TokenBucket::new(1.0, 1.0).unwrap();
        let a = bucket.reserve(Duration::ZERO, 1.0).unwrap();
        let b = bucket.reserve(Duration::ZERO, 1.0).unwrap();
        let c = bucket.reserve(Duration::ZERO, 1.0).unwrap();
        assert_eq!(a.ready_at, Duration::ZERO);
        assert_eq!(b.ready_at, secs(1.0));
        assert_eq!(c.ready_at, secs(2.0));
        assert_eq!(c.wait, secs(2.0));
        assert_eq!(bucket.available(Duration::ZERO), 0.0);
        assert_eq!(bucket.available(secs(2.5)), 0.5);
    }

    #[test]
    fn level_stays_within_capacity() {
        let mut bucket = TokenBucket::with_state(1.0, 10.0, 0.0, Duration::ZERO).unwrap();
        let mut now = Duration::ZERO;
        for (step, tokens) in [(10.0, 5.0), (0.0, 10.0), (0.5, 3.0), (20.0, 10.0), (0.0, 0.0)] {
            now += secs(step);
            bucket.reserve(now, tokens).unwrap();
            assert!((0.0..=10.0).contains(&bucket.last_tokens), "level {}", bucket.last_tokens);
            let level = bucket.available(now);
            assert!((0.0..=10.0).contains(&level), "available {level}");
        }
    }

    #[test]
    fn rejects_negative_initial_level() {
        assert_eq!(
            TokenBucket::with_state(1.0, 1.0, -1.0, Duration::ZERO),
            Err(RateLimitError::InvalidTokens(-1.0))
        );
    }

    #[test]
    fn backwards_clock_counts_as_no_elapsed_time() {
        let mut bucket = TokenBucket::with_state(1.0, 5.0, 0.0, secs(10.0)).unwrap();
        let r = bucket.reserve(secs(3.0), 1.0).unwrap();
        assert_eq!(r.ready_at, secs(11.0));
        assert_eq!(r.wait, secs(8.0));
    }

    #[test]
    fn infinite_rate_never_waits() {
        let mut bucket = TokenBucket::new(f64::INFINITY, 3.0).unwrap();
        for _ in 0..100 {
            assert!(bucket.reserve(Duration::ZERO, 3.0).unwrap().is_immediate());
        }
        assert!(matches!(
            bucket.reserve(Duration::ZERO, 4.0),
            Err(RateLimitError::ExceedsCapacity { .. })
        ));
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(TokenBucket::new(0.0, 1.0), Err(RateLimitError::InvalidRate(0.0)));
        assert!(matches!(TokenBucket::new(f64::NAN, 1.0), Err(RateLimitError::InvalidRate(_))));
        assert_eq!(TokenBucket::new(1.0, 0.0), Err(RateLimitError::InvalidCapacity(0.0)));
        assert!(matches!(
            TokenBucket::new(1.0, f64::INFINITY),
            Err(RateLimitError::InvalidCapacity(_))
        ));
        let mut bucket = TokenBucket::new(1.0, 1.0).unwrap();
        assert_eq!(bucket.reserve(Duration::ZERO, -1.0), Err(RateLimitError::InvalidTokens(-1.0)));
    }

    #[test]
    fn oversized_request_does_not_touch_state() {
        let mut bucket = TokenBucket::new(1.0, 2.0).unwrap();
        let before = bucket.clone();
        assert!(bucket.reserve(Duration::ZERO, 3.0).is_err());
        assert_eq!(bucket, before);
    }

    #[test]
    fn limiter_reads_its_clock() {
        let clock = ManualClock::new();
        let limiter = TokenBucketLimiter::with_clock(1.0, 1.0, clock.clone()).unwrap();
        assert!(limiter.reserve(1.0).unwrap().is_immediate());
        assert_eq!(limiter.reserve(1.0).unwrap().wait, secs(1.0));

        clock.advance(secs(3.0));
        // The pending token is due at 1s and the bucket is full again by 2s.
        assert!(limiter.reserve(1.0).unwrap().is_immediate());
        assert_eq!(limiter.snapshot().available(clock.now()), 0.0);
    }

    #[test]
    fn clones_share_state() {
        let clock = ManualClock::new();
        let a = TokenBucketLimiter::with_clock(1.0, 1.0, clock).unwrap();
        let b = a.clone();
        a.reserve(1.0).unwrap();
        assert_eq!(b.reserve(1.0).unwrap().wait, secs(1.0));
    }
}

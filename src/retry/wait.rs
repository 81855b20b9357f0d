//! Wait strategies between attempts.
//!
//! Attempt semantics: `delay(n)` is the pause after the `n`-th attempt failed (1-based), i.e.
//! before attempt `n + 1`. Delays saturate at [`MAX_WAIT`] so no strategy can overflow.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use tether::retry::Wait;
//!
//! let wait = Wait::exponential(Duration::from_millis(100), 2.0)
//!     .unwrap()
//!     .bounded(Duration::ZERO, Duration::from_secs(1))
//!     .unwrap();
//! assert_eq!(wait.delay(1), Duration::from_millis(100));
//! assert_eq!(wait.delay(2), Duration::from_millis(200));
//! assert_eq!(wait.delay(10), Duration::from_secs(1)); // capped
//! ```

use crate::error::BuildError;
use rand::{rng, Rng};
use std::ops::Add;
use std::time::Duration;

/// Upper bound for any computed wait (1 day).
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
enum WaitKind {
    Zero,
    Fixed(Vec<Duration>),
    Random { min: Duration, max: Duration },
    Jitter { bound: Duration },
    Exponential { multiplier: Duration, base: f64, lower: Duration, upper: Duration },
    Sum(Box<Wait>, Box<Wait>),
}

/// How long to pause before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Wait {
    kind: WaitKind,
}

impl Default for Wait {
    fn default() -> Self {
        Self::zero()
    }
}

impl Wait {
    /// Retry immediately.
    pub fn zero() -> Self {
        Self { kind: WaitKind::Zero }
    }

    /// Same delay every time.
    pub fn fixed(delay: Duration) -> Self {
        Self { kind: WaitKind::Fixed(vec![delay.min(MAX_WAIT)]) }
    }

    /// Delay per attempt; attempts past the end reuse the last entry.
    pub fn sequence(delays: impl IntoIterator<Item = Duration>) -> Result<Self, BuildError> {
        let delays: Vec<Duration> = delays.into_iter().map(|d| d.min(MAX_WAIT)).collect();
        if delays.is_empty() {
            return Err(BuildError::EmptyFixedWait);
        }
        Ok(Self { kind: WaitKind::Fixed(delays) })
    }

    /// Uniform in `[min, max]`.
    pub fn random(min: Duration, max: Duration) -> Result<Self, BuildError> {
        if min > max {
            return Err(BuildError::EmptyWaitRange { min, max });
        }
        Ok(Self { kind: WaitKind::Random { min: min.min(MAX_WAIT), max: max.min(MAX_WAIT) } })
    }

    /// Uniform in `[0, bound]`.
    pub fn jitter(bound: Duration) -> Self {
        Self { kind: WaitKind::Jitter { bound: bound.min(MAX_WAIT) } }
    }

    /// `multiplier × base^(attempt-1)`, bounded to `[0, MAX_WAIT]` until [`Wait::bounded`].
    pub fn exponential(multiplier: Duration, base: f64) -> Result<Self, BuildError> {
        if !base.is_finite() || base <= 0.0 {
            return Err(BuildError::InvalidExponential("base must be finite and > 0"));
        }
        Ok(Self {
            kind: WaitKind::Exponential { multiplier, base, lower: Duration::ZERO, upper: MAX_WAIT },
        })
    }

    /// Clamp an exponential wait to `[lower, upper]`.
    ///
    /// # Errors
    /// When `lower > upper` or the wait is not exponential.
    pub fn bounded(self, lower: Duration, upper: Duration) -> Result<Self, BuildError> {
        if lower > upper {
            return Err(BuildError::InvalidExponential("lower bound exceeds upper bound"));
        }
        match self.kind {
            WaitKind::Exponential { multiplier, base, .. } => Ok(Self {
                kind: WaitKind::Exponential {
                    multiplier,
                    base,
                    lower: lower.min(MAX_WAIT),
                    upper: upper.min(MAX_WAIT),
                },
            }),
            _ => Err(BuildError::InvalidExponential("bounds apply to exponential waits only")),
        }
    }

    /// Pause after the `attempt`-th failure, using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rng())
    }

    /// Pause after the `attempt`-th failure with a caller-supplied RNG.
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        match &self.kind {
            WaitKind::Zero => Duration::ZERO,
            WaitKind::Fixed(delays) => {
                let index = (attempt.max(1) as usize - 1).min(delays.len() - 1);
                delays[index]
            }
            WaitKind::Random { min, max } => uniform(*min, *max, rng),
            WaitKind::Jitter { bound } => uniform(Duration::ZERO, *bound, rng),
            WaitKind::Exponential { multiplier, base, lower, upper } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = multiplier.as_secs_f64() * base.powi(exponent);
                let delay = if secs.is_finite() {
                    Duration::try_from_secs_f64(secs).unwrap_or(*upper)
                } else {
                    *upper
                };
                delay.clamp(*lower, *upper)
            }
            WaitKind::Sum(a, b) => a
                .delay_with_rng(attempt, rng)
                .saturating_add(b.delay_with_rng(attempt, rng))
                .min(MAX_WAIT),
        }
    }
}

fn uniform<R: Rng>(min: Duration, max: Duration, rng: &mut R) -> Duration {
    let lo = saturating_nanos(min);
    let hi = saturating_nanos(max);
    if lo >= hi {
        return min;
    }
    Duration::from_nanos(rng.random_range(lo..=hi))
}

fn saturating_nanos(duration: Duration) -> u64 {
    duration.as_nanos().try_into().unwrap_or(u64::MAX)
}

impl Add for Wait {
    type Output = Wait;

    /// Sum of both delays.
    fn add(self, rhs: Wait) -> Wait {
        Wait { kind: WaitKind::Sum(Box::new(self), Box::new(rhs)) }
    }
}

//! Rate limiting primitives.
//!
//! This module provides the building blocks for rate limiting:
//! - [`TokenBucket`]: the pure reservation algorithm over an explicit clock reading.
//! - [`TokenBucketLimiter`]: a bucket shared between callers behind a lock.
//! - [`RateLimitInterceptor`]: pipeline stage that waits out reservations.
//!
//! # Architecture
//!
//! Limiting is reservation based: a caller asks for `n` tokens and is told *when* it may
//! proceed. The bucket is updated immediately (a waiting reservation empties it as of its
//! `ready_at`), so concurrent callers queue behind one another in arrival order without ever holding the lock while they wait. The
//! interceptor does the waiting through the call's [`Sleeper`](crate::Sleeper).

use std::time::Duration;
use thiserror::Error;

pub mod middleware;
pub mod strategies;
pub use middleware::RateLimitInterceptor;
pub use strategies::{TokenBucket, TokenBucketLimiter};

/// A granted reservation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    /// Clock reading at which the caller may proceed.
    pub ready_at: Duration,
    /// Tokens reserved.
    pub tokens: f64,
    /// How long the caller has to wait from the moment of reservation.
    pub wait: Duration,
}

impl Reservation {
    /// True if the caller can proceed immediately.
    pub fn is_immediate(&self) -> bool {
        self.wait.is_zero()
    }
}

/// Rate limiter failures. All are raised at reservation time and never queued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitError {
    /// Refill rate must be positive (infinity allowed).
    #[error("rate must be > 0 (got {0})")]
    InvalidRate(f64),
    /// Capacity must be positive and finite.
    #[error("capacity must be > 0 and finite (got {0})")]
    InvalidCapacity(f64),
    /// Token requests must be finite and non-negative.
    #[error("token request must be >= 0 and finite (got {0})")]
    InvalidTokens(f64),
    /// A single request asked for more tokens than the bucket can ever hold.
    #[error("requested {requested} tokens but bucket capacity is {capacity}")]
    ExceedsCapacity {
        /// Tokens requested.
        requested: f64,
        /// Bucket capacity.
        capacity: f64,
    },
}

/// Core interface for rate limiting logic.
///
/// Implementations must update their state before returning so that the next caller sees the
/// reservation; the caller is responsible for waiting `Reservation::wait`.
pub trait RateLimiter: Send + Sync + std::fmt::Debug {
    /// Reserve `tokens` and report when the caller may proceed.
    fn reserve(&self, tokens: f64) -> Result<Reservation, RateLimitError>;
}

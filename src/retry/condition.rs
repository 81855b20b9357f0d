//! Composable predicates over a [`RetryContext`].
//!
//! The same type serves as the retry condition ("should this outcome be retried?") and the stop
//! condition ("have we tried enough?"). Combine with `&`, `|`, and `!`:
//!
//! ```rust
//! use tether::retry::Condition;
//! use tether::{ErrorKind, Response};
//!
//! let retry = Condition::<Response>::status([429, 503]) | Condition::error_kind(ErrorKind::Transport);
//! let stop = Condition::<Response>::after_attempts(5) & !Condition::never();
//! # let _ = (retry, stop);
//! ```

use super::RetryContext;
use crate::error::{Error, ErrorKind};
use crate::response::Response;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;
use std::time::Duration;

/// Predicate evaluated after each attempt.
pub struct Condition<T> {
    predicate: Arc<dyn Fn(&RetryContext<T>) -> bool + Send + Sync>,
}

impl<T> Clone for Condition<T> {
    fn clone(&self) -> Self {
        Self { predicate: self.predicate.clone() }
    }
}

impl<T> fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(<predicate>)")
    }
}

impl<T: 'static> Condition<T> {
    /// Arbitrary predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&RetryContext<T>) -> bool + Send + Sync + 'static,
    {
        Self { predicate: Arc::new(predicate) }
    }

    /// Always true.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Always false.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// The last attempt failed with any error.
    pub fn on_error() -> Self {
        Self::new(|ctx| ctx.last_error().is_some())
    }

    /// The last error is `kind` or a descendant of it (a timeout is also a server error).
    pub fn error_kind(kind: ErrorKind) -> Self {
        Self::new(move |ctx| ctx.last_error().is_some_and(|e| e.is(kind)))
    }

    /// The last error satisfies `predicate`.
    pub fn error<F>(predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        Self::new(move |ctx| ctx.last_error().is_some_and(&predicate))
    }

    /// An `E` appears anywhere in the last error's cause chain.
    pub fn caused_by<E: std::error::Error + 'static>() -> Self {
        Self::new(|ctx| ctx.last_error().is_some_and(Error::caused_by::<E>))
    }

    /// The last attempt succeeded with a value satisfying `predicate`.
    pub fn result<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(move |ctx| ctx.last_result().is_some_and(&predicate))
    }

    /// True once `attempts` attempts have been made. Intended as a stop condition.
    pub fn after_attempts(attempts: u32) -> Self {
        Self::new(move |ctx| ctx.attempt_number() > attempts)
    }

    /// True once `limit` has elapsed since the first attempt started. Intended as a stop
    /// condition.
    pub fn after_elapsed(limit: Duration) -> Self {
        Self::new(move |ctx| ctx.elapsed() >= limit)
    }

    /// Both hold.
    pub fn and(self, other: Self) -> Self {
        Self::new(move |ctx| self.evaluate(ctx) && other.evaluate(ctx))
    }

    /// Either holds.
    pub fn or(self, other: Self) -> Self {
        Self::new(move |ctx| self.evaluate(ctx) || other.evaluate(ctx))
    }

    /// Negation.
    pub fn negate(self) -> Self {
        Self::new(move |ctx| !self.evaluate(ctx))
    }
}

impl<T> Condition<T> {
    /// Evaluate against a context.
    pub fn evaluate(&self, ctx: &RetryContext<T>) -> bool {
        (self.predicate)(ctx)
    }
}

impl Condition<Response> {
    /// The last response, or the response carried by the last error, has one of `codes`.
    pub fn status(codes: impl IntoIterator<Item = u16>) -> Self {
        let codes: Vec<u16> = codes.into_iter().collect();
        Self::new(move |ctx| {
            let status = match (ctx.last_result(), ctx.last_error()) {
                (Some(response), _) => Some(response.status()),
                (None, Some(error)) => error.status(),
                (None, None) => None,
            };
            status.is_some_and(|s| codes.contains(&s.as_u16()))
        })
    }
}

impl<T: 'static> BitAnd for Condition<T> {
    type Output = Condition<T>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl<T: 'static> BitOr for Condition<T> {
    type Output = Condition<T>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl<T: 'static> Not for Condition<T> {
    type Output = Condition<T>;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

//! Retry engine.
//!
//! Drives an operation until its outcome is not worth retrying or the stop condition fires.
//!
//! Semantics:
//! - Attempt 1 runs immediately. After each attempt exactly one of `last_result` /
//!   `last_error` is recorded (both are reset per attempt).
//! - The retry condition is evaluated first; `false` returns the outcome as-is.
//! - Otherwise `attempt_number` advances and the stop condition is evaluated; `true` returns the
//!   last outcome (a recorded error propagates unchanged, it is never wrapped).
//! - Otherwise the engine waits `wait.delay(failed_attempt)` through its [`Sleeper`] and tries
//!   again. Zero waits do not touch the sleeper.
//! - Fatal pipeline misuse ([`Error::is_fatal`]) is returned immediately, whatever the
//!   conditions say.
//!
//! Invariants:
//! - A successful attempt is never followed by another unless the retry condition asks for it.
//! - [`RetryError`] is only produced when the loop ends with nothing recorded.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use tether::retry::{Condition, RetryPolicy, Wait};
//! use tether::{Error, InstantSleeper, TransportError};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::<u32>::builder()
//!     .retry_if(Condition::on_error())
//!     .wait(Wait::fixed(Duration::from_millis(100)))
//!     .stop(Condition::after_attempts(3))
//!     .with_sleeper(InstantSleeper)
//!     .build();
//!
//! let mut calls = 0;
//! let result = policy
//!     .execute(|| {
//!         calls += 1;
//!         let outcome = if calls < 3 {
//!             Err(Error::from(TransportError::connect("refused")))
//!         } else {
//!             Ok(calls)
//!         };
//!         async move { outcome }
//!     })
//!     .await;
//! assert_eq!(result.unwrap(), 3);
//! # });
//! ```

mod condition;
mod wait;

pub use condition::Condition;
pub use wait::{Wait, MAX_WAIT};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Error, ErrorKind, Result, RetryError};
use crate::pipeline::{Context, Interceptor};
use crate::response::Response;
use crate::sleeper::{Sleeper, TokioSleeper};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Statuses retried by the default condition.
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// State visible to retry and stop conditions.
#[derive(Debug)]
pub struct RetryContext<T> {
    attempt_number: u32,
    started_at: Duration,
    now: Duration,
    last_result: Option<T>,
    last_error: Option<Error>,
}

impl<T> RetryContext<T> {
    /// Fresh context for attempt 1 started at clock reading `started_at`.
    pub fn new(started_at: Duration) -> Self {
        Self { attempt_number: 1, started_at, now: started_at, last_result: None, last_error: None }
    }

    /// 1-based attempt counter. During stop evaluation it already names the next attempt.
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// Clock reading when the first attempt started.
    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    /// Time from the first attempt to the end of the latest one.
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_sub(self.started_at)
    }

    /// Value of the latest attempt, if it succeeded.
    pub fn last_result(&self) -> Option<&T> {
        self.last_result.as_ref()
    }

    /// Error of the latest attempt, if it failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Record the outcome of the current attempt, replacing the previous one.
    pub fn record(&mut self, outcome: Result<T>, now: Duration) {
        self.now = now;
        match outcome {
            Ok(value) => {
                self.last_result = Some(value);
                self.last_error = None;
            }
            Err(error) => {
                self.last_result = None;
                self.last_error = Some(error);
            }
        }
    }

    /// Advance to the next attempt.
    pub fn next_attempt(&mut self) {
        self.attempt_number = self.attempt_number.saturating_add(1);
    }

    fn take_outcome(&mut self, attempts: u32) -> Result<T> {
        match (self.last_result.take(), self.last_error.take()) {
            (_, Some(error)) => Err(error),
            (Some(value), None) => Ok(value),
            (None, None) => Err(RetryError { attempts }.into()),
        }
    }
}

/// Retry policy combining retry condition, wait strategy, stop condition, and sleeper.
pub struct RetryPolicy<T> {
    retry_if: Condition<T>,
    wait: Wait,
    stop: Condition<T>,
    sleeper: Option<Arc<dyn Sleeper>>,
    clock: Arc<dyn Clock>,
}

impl<T> Clone for RetryPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            retry_if: self.retry_if.clone(),
            wait: self.wait.clone(),
            stop: self.stop.clone(),
            sleeper: self.sleeper.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T> std::fmt::Debug for RetryPolicy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retry_if", &self.retry_if)
            .field("wait", &self.wait)
            .field("stop", &self.stop)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

/// Outcome of recording one attempt.
#[derive(Debug)]
pub enum Step<T> {
    /// Wait this long, then attempt again.
    Retry(Duration),
    /// Stop and return this outcome.
    Done(Result<T>),
}

/// Attempt bookkeeping for one execution of a [`RetryPolicy`].
///
/// Exposed so callers that cannot hand the engine a closure (the retry interceptor re-enters
/// the pipeline through `&mut Context`) can drive the loop themselves.
#[derive(Debug)]
pub struct Attempts<'a, T> {
    policy: &'a RetryPolicy<T>,
    ctx: RetryContext<T>,
}

impl<T: 'static> Attempts<'_, T> {
    /// Current context.
    pub fn context(&self) -> &RetryContext<T> {
        &self.ctx
    }

    /// Record an attempt and decide what happens next.
    pub fn record(&mut self, outcome: Result<T>) -> Step<T> {
        let attempt = self.ctx.attempt_number;
        self.ctx.record(outcome, self.policy.clock.now());

        if self.ctx.last_error.as_ref().is_some_and(Error::is_fatal) {
            return Step::Done(self.ctx.take_outcome(attempt));
        }
        if !self.policy.retry_if.evaluate(&self.ctx) {
            return Step::Done(self.ctx.take_outcome(attempt));
        }

        self.ctx.next_attempt();
        if self.policy.stop.evaluate(&self.ctx) {
            warn!(attempts = attempt, "retries exhausted");
            return Step::Done(self.ctx.take_outcome(attempt));
        }

        Step::Retry(self.policy.wait.delay(attempt))
    }
}

impl<T: Send + 'static> RetryPolicy<T> {
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder<T> {
        RetryPolicyBuilder::new()
    }

    /// Start an execution.
    pub fn start(&self) -> Attempts<'_, T> {
        Attempts { policy: self, ctx: RetryContext::new(self.clock.now()) }
    }

    /// Sleeper override, if one was configured.
    pub fn sleeper(&self) -> Option<&Arc<dyn Sleeper>> {
        self.sleeper.as_ref()
    }

    /// Execute an async operation with retry semantics.
    ///
    /// Waits use the configured sleeper, or [`TokioSleeper`] when none is set.
    pub async fn execute<Fut, Op>(&self, mut operation: Op) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
        Op: FnMut() -> Fut,
    {
        let sleeper: Arc<dyn Sleeper> = self.sleeper.clone().unwrap_or_else(|| Arc::new(TokioSleeper));
        let mut attempts = self.start();
        loop {
            match attempts.record(operation().await) {
                Step::Done(outcome) => return outcome,
                Step::Retry(delay) => {
                    if !delay.is_zero() {
                        sleeper.sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<T> {
    retry_if: Condition<T>,
    wait: Wait,
    stop: Condition<T>,
    sleeper: Option<Arc<dyn Sleeper>>,
    clock: Arc<dyn Clock>,
}

impl<T: 'static> RetryPolicyBuilder<T> {
    /// Defaults: retry any error, no wait, stop after 3 attempts.
    pub fn new() -> Self {
        Self {
            retry_if: Condition::on_error(),
            wait: Wait::zero(),
            stop: Condition::after_attempts(3),
            sleeper: None,
            clock: Arc::new(MonotonicClock::default()),
        }
    }

    /// Condition deciding whether an outcome is retried.
    pub fn retry_if(mut self, condition: Condition<T>) -> Self {
        self.retry_if = condition;
        self
    }

    /// Wait strategy between attempts.
    pub fn wait(mut self, wait: Wait) -> Self {
        self.wait = wait;
        self
    }

    /// Condition ending the loop.
    pub fn stop(mut self, condition: Condition<T>) -> Self {
        self.stop = condition;
        self
    }

    /// Override the sleeper (tests use `InstantSleeper` / `TrackingSleeper`).
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Some(Arc::new(sleeper));
        self
    }

    /// Clock used for `started_at` and elapsed-time stops.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Finish.
    pub fn build(self) -> RetryPolicy<T> {
        RetryPolicy {
            retry_if: self.retry_if,
            wait: self.wait,
            stop: self.stop,
            sleeper: self.sleeper,
            clock: self.clock,
        }
    }
}

impl<T: 'static> Default for RetryPolicyBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder<Response> {
    /// HTTP defaults: retry transport failures and 429/502/503/504, exponential wait from
    /// 500ms capped at 30s, stop after 3 attempts.
    pub fn http() -> Self {
        let wait = Wait::exponential(Duration::from_millis(500), 2.0)
            .and_then(|w| w.bounded(Duration::ZERO, Duration::from_secs(30)))
            .unwrap_or_default();
        Self::new()
            .retry_if(
                Condition::status(RETRYABLE_STATUSES) | Condition::error_kind(ErrorKind::Transport),
            )
            .wait(wait)
    }
}

/// Pipeline stage that re-runs everything below it.
#[derive(Debug, Clone)]
pub struct RetryInterceptor {
    policy: RetryPolicy<Response>,
}

impl RetryInterceptor {
    /// Wrap a policy.
    pub fn new(policy: RetryPolicy<Response>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    async fn intercept(&self, ctx: &mut Context) -> Result<Response> {
        let sleeper = self.policy.sleeper().cloned();
        let mut attempts = self.policy.start();
        loop {
            let outcome = ctx.proceed().await;
            match attempts.record(outcome) {
                Step::Done(outcome) => return outcome,
                Step::Retry(delay) => {
                    debug!(
                        endpoint = ctx.endpoint(),
                        attempt = attempts.context().attempt_number(),
                        ?delay,
                        "retrying"
                    );
                    ctx.sleep(sleeper.as_ref(), delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{PipelineError, TransportError};
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn refused() -> Error {
        TransportError::connect("refused").into()
    }

    #[tokio::test]
    async fn success_is_returned_without_retry() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::<u32>::builder().with_sleeper(InstantSleeper).build();
        let result = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_propagates_last_error_unchanged() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::<u32>::builder()
            .stop(Condition::after_attempts(4))
            .with_sleeper(InstantSleeper)
            .build();
        let err = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(refused()) }
            })
            .await
            .unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::<u32>::builder()
            .retry_if(Condition::error_kind(ErrorKind::Timeout))
            .with_sleeper(InstantSleeper)
            .build();
        let err = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(refused()) }
            })
            .await
            .unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(err.is(ErrorKind::Transport));
    }

    #[tokio::test]
    async fn waits_are_indexed_by_failed_attempt() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::<u32>::builder()
            .wait(Wait::sequence([Duration::from_millis(10), Duration::from_millis(20)]).unwrap())
            .stop(Condition::after_attempts(4))
            .with_sleeper(sleeper.clone())
            .build();
        let _ = policy.execute(|| async { Err(refused()) }).await;
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_millis(10), Duration::from_millis(20), Duration::from_millis(20)]
        );
    }

    #[tokio::test]
    async fn zero_wait_never_sleeps() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::<u32>::builder().with_sleeper(sleeper.clone()).build();
        let _ = policy.execute(|| async { Err(refused()) }).await;
        assert!(sleeper.calls().is_empty());
    }

    #[tokio::test]
    async fn results_can_be_retried_too() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::<u32>::builder()
            .retry_if(Condition::result(|v: &u32| *v < 3))
            .stop(Condition::never())
            .with_sleeper(InstantSleeper)
            .build();
        let result = policy
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_bypass_conditions() {
        let counter = AtomicU32::new(0);
        let policy = RetryPolicy::<u32>::builder()
            .retry_if(Condition::always())
            .stop(Condition::never())
            .with_sleeper(InstantSleeper)
            .build();
        let err = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(PipelineError::NoMoreSteps { cursor: 1, steps: 1 }.into()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn elapsed_stop_uses_policy_clock() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::<u32>::builder()
            .stop(Condition::after_elapsed(Duration::from_secs(5)))
            .with_clock(clock.clone())
            .build();
        let mut attempts = policy.start();
        clock.advance(Duration::from_secs(2));
        assert!(matches!(attempts.record(Err(refused())), Step::Retry(_)));
        clock.advance(Duration::from_secs(3));
        assert!(matches!(attempts.record(Err(refused())), Step::Done(Err(_))));
    }

    #[test]
    fn http_defaults_retry_throttling_and_transport_failures() {
        let policy = RetryPolicyBuilder::http().with_sleeper(InstantSleeper).build();
        let mut attempts = policy.start();
        let throttled = crate::error::ResponseError::status(Response::new(
            http::StatusCode::TOO_MANY_REQUESTS,
            "",
        ));
        assert!(matches!(attempts.record(Err(throttled.into())), Step::Retry(_)));
        assert!(matches!(attempts.record(Err(refused())), Step::Retry(_)));
        // Third attempt hits the default stop.
        assert!(matches!(attempts.record(Err(refused())), Step::Done(Err(_))));

        let mut attempts = policy.start();
        let not_found =
            crate::error::ResponseError::status(Response::new(http::StatusCode::NOT_FOUND, ""));
        assert!(matches!(attempts.record(Err(not_found.into())), Step::Done(Err(_))));
    }
}

use crate::error::Result;
use crate::pipeline::{Context, Interceptor};
use crate::rate_limit::RateLimiter;
use crate::response::Response;
use crate::sleeper::Sleeper;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Pipeline stage that reserves tokens from a [`RateLimiter`] and waits until the reservation
/// is ready before proceeding.
///
/// Placed inside the retry stage, so every attempt pays for its own tokens.
#[derive(Debug, Clone)]
pub struct RateLimitInterceptor {
    limiter: Arc<dyn RateLimiter>,
    tokens: f64,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl RateLimitInterceptor {
    /// Charge `tokens` per attempt against `limiter`.
    pub fn new(limiter: Arc<dyn RateLimiter>, tokens: f64) -> Self {
        Self { limiter, tokens, sleeper: None }
    }

    /// Wait with `sleeper` instead of the execution mode's default.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }
}

#[async_trait]
impl Interceptor for RateLimitInterceptor {
    async fn intercept(&self, ctx: &mut Context) -> Result<Response> {
        let reservation = self.limiter.reserve(self.tokens)?;
        if !reservation.is_immediate() {
            debug!(
                endpoint = ctx.endpoint(),
                wait_ms = reservation.wait.as_millis() as u64,
                "rate limited; waiting for tokens"
            );
            ctx.sleep(self.sleeper.as_ref(), reservation.wait).await;
        }
        ctx.proceed().await
    }
}

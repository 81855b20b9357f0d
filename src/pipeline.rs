//! Middleware pipeline.
//!
//! A call runs through an ordered chain of [`Interceptor`]s followed by one terminal step. Each
//! interceptor receives the mutable [`Context`] and decides whether to call
//! [`Context::proceed`] (zero, one, or many times) or to answer on its own. `proceed()` always
//! invokes the step right after the caller, so a retrying interceptor re-runs exactly the steps
//! below it.
//!
//! Stages are ordered by ascending priority; equal priorities keep registration order. The
//! built-in stages use the constants in [`priority`], which puts the cache outermost and
//! authentication closest to the transport:
//!
//! ```text
//! cache(20) -> retry(75) -> rate limit(80) -> auth(90) -> transport
//! ```

use crate::client::{ClassId, Client};
use crate::error::{PipelineError, Result};
use crate::request::Request;
use crate::response::Response;
use crate::sleeper::{Sleeper, ThreadSleeper, TokioSleeper};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Priorities of the built-in interceptors. Lower runs earlier (outer).
pub mod priority {
    /// Response cache.
    pub const CACHE: i32 = 20;
    /// Retry loop.
    pub const RETRY: i32 = 75;
    /// Rate limiter.
    pub const RATE_LIMIT: i32 = 80;
    /// Authentication hook.
    pub const AUTH: i32 = 90;
}

/// One pipeline stage.
#[async_trait]
pub trait Interceptor: Send + Sync + fmt::Debug {
    /// Handle the call. Call `ctx.proceed()` to run the rest of the chain.
    async fn intercept(&self, ctx: &mut Context) -> Result<Response>;
}

/// The step after the last interceptor.
#[async_trait]
pub trait Terminal: Send + Sync + fmt::Debug {
    /// Produce the response for the current request.
    async fn call(&self, ctx: &mut Context) -> Result<Response>;
}

/// Turns a raw transport response into the pipeline outcome.
pub type ResponseCheck = Arc<dyn Fn(Response) -> Result<Response> + Send + Sync>;

/// Terminal step: send through the client's transport, then apply the response check.
#[derive(Clone)]
pub struct TransportTerminal {
    check: ResponseCheck,
}

impl TransportTerminal {
    /// Statuses >= 400 become [`ResponseError`](crate::ResponseError)s.
    pub fn new() -> Self {
        Self::with_check(Arc::new(Response::error_for_status))
    }

    /// Custom response check.
    pub fn with_check(check: ResponseCheck) -> Self {
        Self { check }
    }
}

impl Default for TransportTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransportTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportTerminal").finish_non_exhaustive()
    }
}

#[async_trait]
impl Terminal for TransportTerminal {
    async fn call(&self, ctx: &mut Context) -> Result<Response> {
        let transport = ctx.client().transport();
        let response = transport.send(ctx.request()).await?;
        trace!(status = %response.status(), "transport responded");
        (self.check)(response)
    }
}

/// How the call is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Awaited on an async runtime; waits yield to the scheduler.
    #[default]
    Cooperative,
    /// Driven on the caller's thread; waits park the thread.
    Blocking,
}

impl ExecutionMode {
    /// Sleeper used by stages that do not override it.
    pub fn default_sleeper(self) -> Arc<dyn Sleeper> {
        match self {
            ExecutionMode::Cooperative => Arc::new(TokioSleeper),
            ExecutionMode::Blocking => Arc::new(ThreadSleeper),
        }
    }
}

#[derive(Clone)]
struct Stage {
    priority: i32,
    interceptor: Arc<dyn Interceptor>,
}

/// Ordered stages plus an optional terminal, built once per endpoint.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Stage]>,
    terminal: Option<Arc<dyn Terminal>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self { stages: Arc::from(Vec::new()), terminal: None }
    }
}

impl Pipeline {
    /// Start building.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Number of steps, terminal included.
    pub fn len(&self) -> usize {
        self.stages.len() + usize::from(self.terminal.is_some())
    }

    /// True if there are no steps at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stage priorities in execution order.
    pub fn priorities(&self) -> Vec<i32> {
        self.stages.iter().map(|s| s.priority).collect()
    }

    /// Run the pipeline for one request.
    pub async fn run(
        &self,
        request: Request,
        client: Client,
        endpoint: Arc<str>,
        mode: ExecutionMode,
    ) -> Result<Response> {
        let mut ctx = Context {
            request,
            client,
            endpoint,
            stages: self.stages.clone(),
            terminal: self.terminal.clone(),
            cursor: 0,
            response: None,
            mode,
        };
        ctx.proceed().await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("priorities", &self.priorities())
            .field("terminal", &self.terminal)
            .finish()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
    terminal: Option<Arc<dyn Terminal>>,
}

impl PipelineBuilder {
    /// Register an interceptor at `priority`.
    pub fn stage(mut self, priority: i32, interceptor: Arc<dyn Interceptor>) -> Self {
        self.stages.push(Stage { priority, interceptor });
        self
    }

    /// Set the terminal step.
    pub fn terminal(mut self, terminal: Arc<dyn Terminal>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Order the stages.
    pub fn build(mut self) -> Pipeline {
        // Stable: equal priorities keep registration order.
        self.stages.sort_by_key(|s| s.priority);
        Pipeline { stages: self.stages.into(), terminal: self.terminal }
    }
}

/// Per-call pipeline state.
///
/// Created fresh for every call and owned by that call; nothing in it is shared with other
/// calls except the client handle.
pub struct Context {
    request: Request,
    client: Client,
    endpoint: Arc<str>,
    stages: Arc<[Stage]>,
    terminal: Option<Arc<dyn Terminal>>,
    cursor: usize,
    response: Option<Response>,
    mode: ExecutionMode,
}

impl Context {
    /// Run the step after the current one and return its outcome.
    ///
    /// # Errors
    /// [`PipelineError::NoMoreSteps`] when called from the last step (or on an empty
    /// pipeline), plus whatever the invoked step returns.
    pub async fn proceed(&mut self) -> Result<Response> {
        let at = self.cursor;
        let stages = self.stages.len();

        if at < stages {
            let stage = self.stages[at].clone();
            self.cursor = at + 1;
            let result = stage.interceptor.intercept(self).await;
            self.cursor = at;
            return result;
        }

        match self.terminal.clone() {
            Some(terminal) if at == stages => {
                self.cursor = at + 1;
                let result = terminal.call(self).await;
                self.cursor = at;
                if let Ok(response) = &result {
                    self.response = Some(response.clone());
                }
                result
            }
            _ => Err(PipelineError::NoMoreSteps { cursor: at, steps: self.steps() }.into()),
        }
    }

    /// Number of steps, terminal included.
    pub fn steps(&self) -> usize {
        self.stages.len() + usize::from(self.terminal.is_some())
    }

    /// Index of the step that will run on the next `proceed()`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The bound request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable request, for stages that add headers.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// The client performing the call.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Class identity of the client.
    pub fn class(&self) -> ClassId {
        self.client.class()
    }

    /// Name of the endpoint being called.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Last raw response produced by the terminal step, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// How the call is being driven.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Sleeper matching the execution mode.
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        self.mode.default_sleeper()
    }

    /// Wait for `duration`, preferring `preferred` over the mode default.
    pub async fn sleep(&self, preferred: Option<&Arc<dyn Sleeper>>, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        match preferred {
            Some(sleeper) => sleeper.sleep(duration).await,
            None => self.sleeper().sleep(duration).await,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("endpoint", &self.endpoint)
            .field("request", &self.request)
            .field("cursor", &self.cursor)
            .field("steps", &self.steps())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::error::{Error, ErrorKind};
    use crate::transport::ServiceTransport;
    use http::{Method, StatusCode};
    use parking_lot::Mutex;

    fn client() -> Client {
        Client::builder(ServiceTransport::new(tower::service_fn(|req: Request| async move {
            let status = if req.path() == "/missing" { StatusCode::NOT_FOUND } else { StatusCode::OK };
            Ok::<_, Error>(Response::new(status, "body"))
        })))
        .build()
        .unwrap()
    }

    #[derive(Debug)]
    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor for Record {
        async fn intercept(&self, ctx: &mut Context) -> Result<Response> {
            self.log.lock().push(format!("{}>", self.name));
            let result = ctx.proceed().await;
            self.log.lock().push(format!("<{}", self.name));
            result
        }
    }

    #[derive(Debug)]
    struct ShortCircuit;

    #[async_trait]
    impl Interceptor for ShortCircuit {
        async fn intercept(&self, _ctx: &mut Context) -> Result<Response> {
            Ok(Response::new(StatusCode::ACCEPTED, "cached"))
        }
    }

    #[derive(Debug)]
    struct Twice;

    #[async_trait]
    impl Interceptor for Twice {
        async fn intercept(&self, ctx: &mut Context) -> Result<Response> {
            let first = ctx.proceed().await?;
            let cursor = ctx.cursor();
            let second = ctx.proceed().await?;
            assert_eq!(cursor, ctx.cursor());
            assert_eq!(first.status(), second.status());
            Ok(second)
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Interceptor> {
        Arc::new(Record { name, log: log.clone() })
    }

    #[tokio::test]
    async fn stages_run_by_priority_then_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(90, recorder("auth", &log))
            .stage(20, recorder("cache", &log))
            .stage(75, recorder("retry-a", &log))
            .stage(75, recorder("retry-b", &log))
            .terminal(Arc::new(TransportTerminal::new()))
            .build();
        assert_eq!(pipeline.priorities(), vec![20, 75, 75, 90]);

        let response = pipeline
            .run(Request::new(Method::GET, "/"), client(), "ep".into(), ExecutionMode::Cooperative)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *log.lock(),
            vec!["cache>", "retry-a>", "retry-b>", "auth>", "<auth", "<retry-b", "<retry-a", "<cache"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(10, Arc::new(ShortCircuit))
            .stage(20, recorder("never", &log))
            .terminal(Arc::new(TransportTerminal::new()))
            .build();
        let response = pipeline
            .run(Request::new(Method::GET, "/"), client(), "ep".into(), ExecutionMode::Cooperative)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn proceed_can_be_called_repeatedly() {
        let pipeline = Pipeline::builder()
            .stage(10, Arc::new(Twice))
            .terminal(Arc::new(TransportTerminal::new()))
            .build();
        let response = pipeline
            .run(Request::new(Method::GET, "/"), client(), "ep".into(), ExecutionMode::Cooperative)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_pipeline_has_no_steps() {
        let err = Pipeline::default()
            .run(Request::new(Method::GET, "/"), client(), "ep".into(), ExecutionMode::Cooperative)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Pipeline(PipelineError::NoMoreSteps { cursor: 0, steps: 0 })
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn default_check_turns_4xx_into_response_error() {
        let pipeline = Pipeline::builder().terminal(Arc::new(TransportTerminal::new())).build();
        let err = pipeline
            .run(
                Request::new(Method::GET, "/missing"),
                client(),
                "ep".into(),
                ExecutionMode::Cooperative,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Response);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn custom_check_can_accept_any_status() {
        let pipeline = Pipeline::builder()
            .terminal(Arc::new(TransportTerminal::with_check(Arc::new(
                |response: Response| -> Result<Response> { Ok(response) },
            ))))
            .build();
        let response = pipeline
            .run(
                Request::new(Method::GET, "/missing"),
                client(),
                "ep".into(),
                ExecutionMode::Cooperative,
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

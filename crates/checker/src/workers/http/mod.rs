//! HTTP and WebSocket probes.

mod extract;
mod request;
mod websocket;

use std::time::Duration;

use tracing::warn;

pub use request::HttpRequest;

use crate::context::RunContext;
use crate::dispatcher::{Request, Response, Task, Worker, run_in_context};
use crate::error::TaskError;

/// Default cap on bytes kept from a response body.
pub const MAX_CONTENT_LENGTH: usize = 4096;
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const BODY_READ_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Knobs shared by every HTTP worker in a pool.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub max_content_length: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_content_length: MAX_CONTENT_LENGTH,
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }
}

impl HttpClientConfig {
    pub fn with_max_content_length(mut self, max_content_length: usize) -> Self {
        self.max_content_length = max_content_length;
        self
    }
}

pub struct HttpWorker {
    config: HttpClientConfig,
}

impl HttpWorker {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Worker for HttpWorker {
    async fn work(&self, ctx: &RunContext, task: Task) -> Task {
        let response = match &task.request {
            Request::Http(request) => run_in_context(ctx, request.execute(&self.config)).await,
            other => Response::error(TaskError::UnsupportedRequest(other.task_type().to_string())),
        };
        if let Some(err) = &response.error {
            warn!(target = %task.target, error = %err, "error processing http request");
        }
        task.respond(response)
    }
}

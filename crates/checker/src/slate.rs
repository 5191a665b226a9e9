//! Client for Slate, the external assertion evaluator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::error::CheckerError;
use crate::types::{Assertion, Check};

pub const DEFAULT_MAX_RETRIES: u32 = 11;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Decides whether a response satisfies a check's assertions.
#[async_trait::async_trait]
pub trait AssertionEvaluator: Send + Sync {
    async fn check_assertions(&self, ctx: &RunContext, check: &Check, response: &[u8]) -> Result<bool, CheckerError>;
}

#[derive(Serialize)]
struct SlateRequest<'a> {
    assertions: &'a [Assertion],
    response: serde_json::Value,
}

#[derive(Deserialize)]
struct SlateResponse {
    success: bool,
    #[serde(default)]
    error: String,
}

pub struct SlateClient {
    url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl SlateClient {
    pub fn new(url: impl Into<String>) -> Result<Self, CheckerError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn post(&self, body: &SlateRequest<'_>) -> Result<SlateResponse, CheckerError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CheckerError::SlateStatus(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

/// Sleep before retry `attempt`: 20ms, 40ms, 80ms, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(10u64.saturating_mul(1u64 << (attempt + 1).min(32)))
}

#[async_trait::async_trait]
impl AssertionEvaluator for SlateClient {
    async fn check_assertions(&self, ctx: &RunContext, check: &Check, response: &[u8]) -> Result<bool, CheckerError> {
        let body = SlateRequest {
            assertions: &check.assertions,
            response: serde_json::from_slice(response)?,
        };

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            match self.post(&body).await {
                Ok(verdict) => {
                    if !verdict.error.is_empty() {
                        debug!(check_id = %check.id, error = %verdict.error, "slate reported an assertion error");
                    }
                    return Ok(verdict.success);
                }
                Err(err) => {
                    warn!(check_id = %check.id, attempt, error = %err, "issuing request to slate failed");
                    last_error = Some(err);
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::select! {
                    _ = tokio::time::sleep(backoff(attempt)) => {}
                    err = ctx.done() => return Err(err.into()),
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(false),
        }
    }
}

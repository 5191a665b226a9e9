//! RPC-facing service: batch check CRUD and synchronous test runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::RunContext;
use crate::envelope::CheckWithTargets;
use crate::error::{CheckerError, handle_error};
use crate::resolver::Resolver;
use crate::runner::Runner;
use crate::scheduler::Scheduler;
use crate::types::{Check, CheckResponse};

/// Targets used by a test run when the caller sets no limit.
pub const MAX_TEST_TARGETS: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResourceRequest {
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResourceResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl CheckResourceResponse {
    fn from_result(id: &str, result: Result<Check, CheckerError>) -> Self {
        match result {
            Ok(check) => Self {
                id: id.to_string(),
                check: Some(check),
                error: String::new(),
            },
            Err(err) => Self {
                id: id.to_string(),
                check: None,
                error: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub responses: Vec<CheckResourceResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCheckRequest {
    pub check: Check,
    #[serde(default)]
    pub max_hosts: usize,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCheckResponse {
    pub responses: Vec<CheckResponse>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl TestCheckResponse {
    fn failed(err: &CheckerError) -> Self {
        Self {
            responses: Vec::new(),
            error: handle_error(err),
        }
    }
}

pub struct Checker {
    scheduler: Arc<Scheduler>,
    runner: Arc<Runner>,
    resolver: Arc<dyn Resolver>,
    max_test_targets: usize,
}

impl Checker {
    pub fn new(scheduler: Arc<Scheduler>, runner: Arc<Runner>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            scheduler,
            runner,
            resolver,
            max_test_targets: MAX_TEST_TARGETS,
        }
    }

    pub fn with_max_test_targets(mut self, max_test_targets: usize) -> Self {
        self.max_test_targets = max_test_targets;
        self
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub async fn create_check(&self, request: &CheckResourceRequest) -> ResourceResponse {
        let mut responses = Vec::with_capacity(request.checks.len());
        for check in &request.checks {
            let result = self.scheduler.create_check(check).await;
            responses.push(CheckResourceResponse::from_result(&check.id, result));
        }
        ResourceResponse { responses }
    }

    pub fn retrieve_check(&self, request: &CheckResourceRequest) -> ResourceResponse {
        let responses = request
            .checks
            .iter()
            .map(|check| CheckResourceResponse::from_result(&check.id, self.scheduler.retrieve_check(check)))
            .collect();
        ResourceResponse { responses }
    }

    pub fn delete_check(&self, request: &CheckResourceRequest) -> ResourceResponse {
        let responses = request
            .checks
            .iter()
            .map(|check| CheckResourceResponse::from_result(&check.id, self.scheduler.delete_check(check)))
            .collect();
        ResourceResponse { responses }
    }

    /// Replace each check: delete whatever is scheduled, then create anew.
    pub async fn update_check(&self, request: &CheckResourceRequest) -> ResourceResponse {
        for check in &request.checks {
            if let Err(err) = self.scheduler.delete_check(check) {
                debug!(check_id = %check.id, error = %err, "updating check that was not scheduled");
            }
        }
        self.create_check(request).await
    }

    /// Resolve and run a check once, synchronously, within the caller's
    /// deadline.
    ///
    /// Only a missing deadline fails the call; resolution and run failures
    /// are reported in the response's `error`.
    pub async fn test_check(&self, request: TestCheckRequest) -> Result<TestCheckResponse, CheckerError> {
        let deadline = request.deadline.ok_or(CheckerError::MissingDeadline)?;
        let remaining = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let max_hosts = match request.max_hosts {
            0 => self.max_test_targets,
            n => n,
        };
        let ctx = RunContext::background()
            .with_timeout(remaining)
            .with_max_hosts(max_hosts);

        let envelope = match CheckWithTargets::resolve(self.resolver.as_ref(), &ctx, request.check).await {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "test check could not resolve targets");
                return Ok(TestCheckResponse::failed(&err));
            }
        };

        match self.runner.run_check(&ctx, &envelope.check, envelope.targets).await {
            Ok(mut responses) => {
                responses.truncate(max_hosts);
                Ok(TestCheckResponse {
                    responses,
                    error: String::new(),
                })
            }
            Err(err) => {
                warn!(check_id = %envelope.check.id, error = %err, "test check failed");
                Ok(TestCheckResponse::failed(&err))
            }
        }
    }
}

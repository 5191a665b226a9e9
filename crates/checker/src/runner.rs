//! Turns a check plus its resolved targets into per-target responses.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::dispatcher::{Dispatcher, Request, Response, Task, TaskGroup};
use crate::error::{CheckerError, TaskError};
use crate::slate::AssertionEvaluator;
use crate::types::{Check, CheckResponse, CheckSpec, Target};
use crate::workers::{CloudWatchRequest, HttpRequest};

pub struct Runner {
    dispatcher: Dispatcher,
    evaluator: Option<Arc<dyn AssertionEvaluator>>,
}

impl Runner {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn AssertionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Run `check` against `targets` and return one response per dispatched
    /// target, in target order.
    ///
    /// Targets beyond the context's `max_hosts` are dropped before dispatch.
    /// A response only passes when assertions exist, an evaluator is
    /// configured and the evaluator says so.
    pub async fn run_check(
        &self,
        ctx: &RunContext,
        check: &Check,
        mut targets: Vec<Target>,
    ) -> Result<Vec<CheckResponse>, CheckerError> {
        if targets.is_empty() {
            let origin = check.target.as_ref().map(Target::to_string).unwrap_or_default();
            return Err(CheckerError::NoTargets(origin));
        }
        if let Some(max_hosts) = ctx.max_hosts() {
            if max_hosts > 0 && targets.len() > max_hosts {
                debug!(check_id = %check.id, max_hosts, "truncating targets");
                targets.truncate(max_hosts);
            }
        }

        let tasks = build_tasks(check, targets)?;
        debug!(check_id = %check.id, tasks = tasks.len(), "dispatching check");
        let finished = self.dispatcher.dispatch(ctx, tasks);
        Ok(self.run_assertions(ctx, check, finished).await)
    }

    async fn run_assertions(&self, ctx: &RunContext, check: &Check, mut finished: mpsc::Receiver<Task>) -> Vec<CheckResponse> {
        let mut responses = Vec::new();

        while let Some(task) = finished.recv().await {
            let Task { target, response, .. } = task;
            let response = response
                .unwrap_or_else(|| Response::error(TaskError::Request("worker returned no response".to_string())));

            let mut error = String::new();
            let mut payload = None;
            if let Some(body) = &response.payload {
                match serde_json::to_value(body) {
                    Ok(value) => payload = Some(value),
                    Err(err) => error = err.to_string(),
                }
            }
            if let Some(err) = &response.error {
                error = err.to_string();
            }

            let mut passing = false;
            if error.is_empty() && !check.assertions.is_empty() {
                if let (Some(evaluator), Some(value)) = (&self.evaluator, &payload) {
                    passing = self.evaluate(evaluator.as_ref(), ctx, check, &target, value).await;
                }
            }

            responses.push(CheckResponse {
                target,
                response: payload,
                error,
                passing,
            });
        }

        responses
    }

    async fn evaluate(
        &self,
        evaluator: &dyn AssertionEvaluator,
        ctx: &RunContext,
        check: &Check,
        target: &Target,
        payload: &serde_json::Value,
    ) -> bool {
        let raw = match serde_json::to_vec(payload) {
            Ok(raw) => raw,
            Err(err) => {
                error!(check_id = %check.id, error = %err, "could not encode response for assertions");
                return false;
            }
        };
        match evaluator.check_assertions(ctx, check, &raw).await {
            Ok(passing) => {
                debug!(check_id = %check.id, target = %target, passing, "evaluated assertions");
                passing
            }
            Err(err) => {
                error!(check_id = %check.id, target = %target, error = %err, "could not evaluate assertions");
                false
            }
        }
    }
}

/// One task per target able to carry the check. Targets missing what the
/// request needs are skipped.
fn build_tasks(check: &Check, targets: Vec<Target>) -> Result<TaskGroup, CheckerError> {
    let spec = check.spec.as_ref().ok_or(CheckerError::MissingSpec)?;
    let mut tasks = Vec::with_capacity(targets.len());

    for target in targets {
        let request = match spec {
            CheckSpec::Http(http) => {
                if target.address.is_empty() {
                    warn!(check_id = %check.id, target = %target, "skipping target with no address");
                    continue;
                }
                Request::Http(HttpRequest::for_target(http, &target))
            }
            CheckSpec::CloudWatch(cloudwatch) => {
                if target.id.is_empty() {
                    warn!(check_id = %check.id, target = %target, "skipping target with no id");
                    continue;
                }
                if cloudwatch.metrics.is_empty() {
                    info!(check_id = %check.id, "refusing cloudwatch check with no metrics");
                    continue;
                }
                Request::CloudWatch(CloudWatchRequest::for_target(cloudwatch, &target, check.interval))
            }
        };
        tasks.push(Task::new(target, request));
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CloudWatchCheck, HttpCheck};

    fn http_check() -> Check {
        Check::new("check-1", 30).with_spec(CheckSpec::Http(HttpCheck {
            protocol: "http".into(),
            port: 80,
            path: "/".into(),
            verb: "GET".into(),
            ..HttpCheck::default()
        }))
    }

    #[test]
    fn test_targets_without_address_skipped() {
        let targets = vec![
            Target::new("instance", "i-1").with_address("10.0.0.1"),
            Target::new("instance", "i-2"),
        ];
        let tasks = build_tasks(&http_check(), targets).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].target.id, "i-1");
    }

    #[test]
    fn test_cloudwatch_without_metrics_refused() {
        let check = Check::new("check-1", 30).with_spec(CheckSpec::CloudWatch(CloudWatchCheck::default()));
        let tasks = build_tasks(&check, vec![Target::new("instance", "i-1")]).unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_missing_spec() {
        let check = Check::new("check-1", 30);
        assert!(matches!(build_tasks(&check, vec![]), Err(CheckerError::MissingSpec)));
    }
}

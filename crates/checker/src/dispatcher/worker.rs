use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::task::{Response, Task};
use crate::context::RunContext;
use crate::workers::{
    CLOUDWATCH_TASK_TYPE, CloudWatchWorker, HTTP_TASK_TYPE, HttpClientConfig, HttpWorker,
    MetricStatisticsSource,
};

/// Processes one task at a time on behalf of a pool.
///
/// Implementations must always hand the task back with `response` filled
/// in. The pool returns the worker to its idle queue once `work` finishes.
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    async fn work(&self, ctx: &RunContext, task: Task) -> Task;
}

pub type NewWorkerFn = Arc<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

/// Maps a task type to the constructor used to fill its pool.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    recruiters: HashMap<String, NewWorkerFn>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The HTTP and CloudWatch workers, sharing one client configuration and
    /// one metrics backend.
    pub fn with_defaults(http: HttpClientConfig, metrics: Arc<dyn MetricStatisticsSource>) -> Self {
        let mut registry = Self::new();
        registry.register(HTTP_TASK_TYPE, move || Box::new(HttpWorker::new(http.clone())));
        registry.register(CLOUDWATCH_TASK_TYPE, move || {
            Box::new(CloudWatchWorker::new(metrics.clone()))
        });
        registry
    }

    pub fn register<F>(&mut self, task_type: impl Into<String>, recruit: F)
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.recruiters.insert(task_type.into(), Arc::new(recruit));
    }

    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.recruiters.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &NewWorkerFn)> {
        self.recruiters.iter()
    }
}

/// Run `work` unless the context is already done, abandoning it as soon as
/// the context is cancelled or times out.
pub async fn run_in_context<F>(ctx: &RunContext, work: F) -> Response
where
    F: Future<Output = Response>,
{
    if let Some(err) = ctx.err() {
        return Response::error(err);
    }
    tokio::select! {
        response = work => response,
        err = ctx.done() => Response::error(err),
    }
}

//! Fan-out of task groups across per-type worker pools.
//!
//! Every call to [`Dispatcher::dispatch`] spawns one coordinating task that
//! walks the group in order and emits each finished task, so the output
//! stream always has the same length and order as the input.

mod pool;
mod task;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::context::{ContextError, RunContext};
use crate::error::TaskError;
use crate::stats::CheckerStats;

use pool::WorkerPool;

pub use task::{Request, Response, Task, TaskGroup};
pub use worker::{NewWorkerFn, Worker, WorkerRegistry, run_in_context};

/// Upper bound on concurrently running workers of a single type.
pub const MAX_WORKERS_PER_TYPE: usize = 10;

#[derive(Clone)]
pub struct Dispatcher {
    pools: Arc<HashMap<String, WorkerPool>>,
    stats: Arc<CheckerStats>,
}

impl Dispatcher {
    /// Build one pool of `max_per_type` workers for every registered type.
    pub fn new(registry: &WorkerRegistry, max_per_type: usize) -> Self {
        let pools = registry
            .iter()
            .map(|(task_type, recruit)| {
                (task_type.clone(), WorkerPool::new(task_type, recruit, max_per_type))
            })
            .collect();
        Self {
            pools: Arc::new(pools),
            stats: Arc::new(CheckerStats::default()),
        }
    }

    pub fn with_stats(mut self, stats: Arc<CheckerStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Size and current idle count of a pool, if the type is registered.
    pub fn pool_status(&self, task_type: &str) -> Option<(usize, usize)> {
        self.pools.get(task_type).map(|pool| (pool.size(), pool.idle()))
    }

    /// Process `tasks` in order and stream them back as they finish.
    ///
    /// The returned channel yields exactly `tasks.len()` items and then
    /// closes. Once the context is observed done, every remaining task is
    /// answered with that context error without touching a worker pool.
    pub fn dispatch(&self, ctx: &RunContext, tasks: TaskGroup) -> mpsc::Receiver<Task> {
        let (finished_tx, finished_rx) = mpsc::channel(tasks.len().max(1));
        let pools = self.pools.clone();
        let stats = self.stats.clone();
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let total = tasks.len();
            let mut cancelled: Option<ContextError> = None;

            for task in tasks {
                if cancelled.is_none() {
                    cancelled = ctx.err();
                }

                let task = match cancelled {
                    Some(err) => task.respond(Response::error(err)),
                    None => match pools.get(&task.task_type) {
                        Some(pool) => match pool.acquire().await {
                            Some(worker) => {
                                stats.task_dispatched();
                                trace!(task_type = %task.task_type, target = %task.target, "dispatching task");
                                worker.work(&ctx, task).await
                            }
                            None => task.respond(Response::error(TaskError::Request(
                                "worker pool closed".to_string(),
                            ))),
                        },
                        None => {
                            let task_type = task.task_type.clone();
                            task.respond(Response::error(TaskError::UnregisteredWorker(task_type)))
                        }
                    },
                };

                if finished_tx.send(task).await.is_err() {
                    debug!("dispatch receiver dropped, abandoning remaining tasks");
                    return;
                }
            }

            trace!(total, "task group finished");
        });

        finished_rx
    }
}

//! Keeps checks on their intervals and publishes each due check, resolved
//! into targets, for runners to pick up.

mod schedule;
mod timer;
mod validation;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::RunContext;
use crate::envelope::CheckWithTargets;
use crate::error::CheckerError;
use crate::resolver::Resolver;
use crate::stats::CheckerStats;
use crate::transport::{Publisher, RUNNER_TOPIC};
use crate::types::Check;

pub use schedule::ScheduleMap;
pub use timer::CheckTimer;
pub use validation::{MINIMUM_CHECK_INTERVAL, validate_check, validate_check_interval};

/// Capacity of the queue between check timers and the publishing loop.
pub const DUE_QUEUE_DEPTH: usize = 10;

pub struct Scheduler {
    schedule: ScheduleMap,
    due_rx: Mutex<Option<mpsc::Receiver<Check>>>,
    resolver: Arc<dyn Resolver>,
    publisher: Arc<dyn Publisher>,
    topic: String,
    stop: CancellationToken,
    stats: Arc<CheckerStats>,
}

impl Scheduler {
    pub fn new(resolver: Arc<dyn Resolver>, publisher: Arc<dyn Publisher>) -> Self {
        let (schedule, due_rx) = ScheduleMap::new(DUE_QUEUE_DEPTH);
        Self {
            schedule,
            due_rx: Mutex::new(Some(due_rx)),
            resolver,
            publisher,
            topic: RUNNER_TOPIC.to_string(),
            stop: CancellationToken::new(),
            stats: Arc::new(CheckerStats::default()),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_stats(mut self, stats: Arc<CheckerStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Validate and schedule a check. The check runs once right away and
    /// then every `interval` seconds.
    pub async fn create_check(&self, check: &Check) -> Result<Check, CheckerError> {
        validate_check(check)?;
        let scheduled = self.schedule.set(check.clone()).await?;
        self.stats.set_scheduled_checks(self.schedule.len());
        info!(check_id = %check.id, interval = check.interval, "scheduled check");
        Ok((*scheduled).clone())
    }

    pub fn retrieve_check(&self, check: &Check) -> Result<Check, CheckerError> {
        self.schedule
            .get(&check.id)
            .map(|scheduled| (*scheduled).clone())
            .ok_or_else(|| CheckerError::NonExistentCheck(check.id.clone()))
    }

    pub fn delete_check(&self, check: &Check) -> Result<Check, CheckerError> {
        let deleted = self
            .schedule
            .delete(&check.id)
            .ok_or_else(|| CheckerError::NonExistentCheck(check.id.clone()))?;
        self.stats.set_scheduled_checks(self.schedule.len());
        info!(check_id = %check.id, "deleted check");
        Ok((*deleted).clone())
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    /// Spawn the loop that drains the due queue. May only be called once.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, CheckerError> {
        let mut due_rx = self
            .due_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(CheckerError::AlreadyStarted)?;

        let scheduler = self.clone();
        Ok(tokio::spawn(async move {
            info!(topic = %scheduler.topic, "scheduler started");
            loop {
                tokio::select! {
                    biased;
                    _ = scheduler.stop.cancelled() => break,
                    due = due_rx.recv() => match due {
                        Some(check) => scheduler.publish_due(check).await,
                        None => break,
                    },
                }
            }
            scheduler.publisher.stop();
            scheduler.schedule.destroy();
            info!("scheduler stopped");
        }))
    }

    /// Signal the drain loop to stop the publisher and tear down every timer.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    async fn publish_due(&self, check: Check) {
        let check_id = check.id.clone();
        let envelope = match CheckWithTargets::resolve(self.resolver.as_ref(), &RunContext::background(), check).await
        {
            Ok(envelope) => envelope,
            Err(err) => {
                self.stats.resolver_error();
                error!(check_id = %check_id, error = %err, "could not resolve check targets, skipping run");
                return;
            }
        };

        let message = match serde_json::to_vec(&envelope) {
            Ok(message) => message,
            Err(err) => {
                error!(check_id = %check_id, error = %err, "could not encode check");
                return;
            }
        };

        match self.publisher.publish(&self.topic, message).await {
            Ok(()) => debug!(check_id = %check_id, targets = envelope.targets.len(), "published due check"),
            Err(err) => {
                self.stats.publish_error();
                error!(check_id = %check_id, error = %err, "could not publish due check");
            }
        }
    }
}

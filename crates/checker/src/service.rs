//! Consumer side of the runner topic.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context::RunContext;
use crate::envelope::CheckWithTargets;
use crate::error::{CheckerError, handle_error};
use crate::runner::Runner;
use crate::stats::CheckerStats;
use crate::transport::{Publisher, RESULTS_TOPIC};
use crate::types::CheckResult;

/// Envelopes processed concurrently by one service.
pub const MAX_IN_FLIGHT: usize = 2;

/// Runs every envelope it receives and publishes a [`CheckResult`] for it.
pub struct RunnerService {
    runner: Arc<Runner>,
    publisher: Arc<dyn Publisher>,
    customer_id: String,
    results_topic: String,
    stats: Arc<CheckerStats>,
}

impl RunnerService {
    pub fn new(runner: Arc<Runner>, publisher: Arc<dyn Publisher>, customer_id: impl Into<String>) -> Self {
        Self {
            runner,
            publisher,
            customer_id: customer_id.into(),
            results_topic: RESULTS_TOPIC.to_string(),
            stats: Arc::new(CheckerStats::default()),
        }
    }

    pub fn with_results_topic(mut self, topic: impl Into<String>) -> Self {
        self.results_topic = topic.into();
        self
    }

    pub fn with_stats(mut self, stats: Arc<CheckerStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Run one envelope. Each run gets twice the check's interval to finish.
    pub async fn execute(&self, envelope: CheckWithTargets) -> CheckResult {
        let CheckWithTargets { check, targets } = envelope;
        let ctx = RunContext::background().with_timeout(Duration::from_secs(check.interval * 2));

        match self.runner.run_check(&ctx, &check, targets).await {
            Ok(responses) => CheckResult::new(&self.customer_id, &check, responses),
            Err(err) => {
                error!(check_id = %check.id, error = %err, "error running check");
                CheckResult::failed(&self.customer_id, &check, handle_error(&err))
            }
        }
    }

    /// Decode, run and publish a single runner message.
    pub async fn handle(&self, message: &[u8]) -> Result<CheckResult, CheckerError> {
        let envelope: CheckWithTargets = serde_json::from_slice(message)?;
        debug!(check_id = %envelope.check.id, targets = envelope.targets.len(), "received check");

        let result = self.execute(envelope).await;
        self.publisher
            .publish(&self.results_topic, serde_json::to_vec(&result)?)
            .await?;
        self.stats.result_published();
        Ok(result)
    }

    /// Consume messages until the channel closes.
    pub fn spawn(self: Arc<Self>, mut messages: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("runner service started");
            futures::stream::poll_fn(|cx| messages.poll_recv(cx))
                .for_each_concurrent(MAX_IN_FLIGHT, |message| {
                    let service = self.clone();
                    async move {
                        match service.handle(&message).await {
                            Ok(result) => debug!(check_id = %result.check_id, passing = result.passing, "published result"),
                            Err(err) => warn!(error = %err, "dropping runner message"),
                        }
                    }
                })
                .await;
            info!("runner service stopped");
        })
    }
}

//! Liveness beacon published on a fixed rate.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::stats::CheckerStats;
use crate::transport::{HEARTBEAT_TOPIC, Publisher};

pub const DEFAULT_HEART_RATE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartBeat {
    pub process_name: String,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub metrics: BTreeMap<String, u64>,
}

pub struct Heart {
    process_name: String,
    publisher: Arc<dyn Publisher>,
    stats: Arc<CheckerStats>,
    rate: Duration,
    started: Instant,
}

impl Heart {
    pub fn new(process_name: impl Into<String>, publisher: Arc<dyn Publisher>, stats: Arc<CheckerStats>) -> Self {
        Self {
            process_name: process_name.into(),
            publisher,
            stats,
            rate: DEFAULT_HEART_RATE,
            started: Instant::now(),
        }
    }

    pub fn with_rate(mut self, rate: Duration) -> Self {
        self.rate = rate;
        self
    }

    pub fn beat(&self) -> HeartBeat {
        let mut metrics = self.stats.snapshot();
        metrics.insert("uptime_seconds".to_string(), self.started.elapsed().as_secs());
        HeartBeat {
            process_name: self.process_name.clone(),
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            metrics,
        }
    }

    /// Publish a beat every `rate` until `stop` fires.
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.rate);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let beat = self.beat();
                        let message = match serde_json::to_vec(&beat) {
                            Ok(message) => message,
                            Err(err) => {
                                warn!(error = %err, "could not encode heartbeat");
                                continue;
                            }
                        };
                        match self.publisher.publish(HEARTBEAT_TOPIC, message).await {
                            Ok(()) => debug!(process = %self.process_name, "heartbeat"),
                            Err(err) => warn!(error = %err, "could not publish heartbeat"),
                        }
                    }
                }
            }
        })
    }
}

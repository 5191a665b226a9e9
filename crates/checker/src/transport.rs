//! Publishing seam between the scheduler, runners and result consumers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::CheckerError;

pub const RUNNER_TOPIC: &str = "runner";
pub const RESULTS_TOPIC: &str = "results";
pub const HEARTBEAT_TOPIC: &str = "heartbeat";

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<(), CheckerError>;

    /// Stop accepting messages. Called once when the scheduler shuts down.
    fn stop(&self) {}
}

type Subscribers = HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>;

/// In-process topic bus. Every subscriber of a topic receives every message
/// published to it, in publish order.
#[derive(Clone, Default)]
pub struct MemoryBus {
    topics: Arc<RwLock<Subscribers>>,
    stopped: Arc<AtomicBool>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str, capacity: usize) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn senders(&self, topic: &str) -> Vec<mpsc::Sender<Vec<u8>>> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).cloned().unwrap_or_default()
    }

    fn prune(&self, topic: &str) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = topics.get_mut(topic) {
            senders.retain(|tx| !tx.is_closed());
        }
    }
}

#[async_trait::async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<(), CheckerError> {
        if self.is_stopped() {
            return Err(CheckerError::PublisherStopped);
        }

        let senders = self.senders(topic);
        let mut delivered = 0;
        for tx in &senders {
            if tx.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }

        if delivered < senders.len() {
            self.prune(topic);
        }
        if delivered == 0 {
            return Err(CheckerError::NoSubscribers(topic.to_string()));
        }
        trace!(topic, delivered, bytes = message.len(), "published message");
        Ok(())
    }

    fn stop(&self) {
        debug!("stopping memory bus");
        self.stopped.store(true, Ordering::SeqCst);
        self.topics.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

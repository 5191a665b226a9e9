use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::types::Check;

/// Periodic trigger for one scheduled check.
///
/// Every tick pushes a copy of the check onto the due queue. Stopping (or
/// dropping) the timer ends its task; a send blocked on a full queue is
/// abandoned.
pub struct CheckTimer {
    check: Arc<Check>,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl CheckTimer {
    pub fn start(check: Check, due_tx: mpsc::Sender<Check>) -> Self {
        let period = Duration::from_secs(check.interval.max(1));
        let check = Arc::new(check);
        let stop = CancellationToken::new();
        let handle = tokio::spawn(tick(check.clone(), due_tx, stop.clone(), period));
        Self { check, stop, handle }
    }

    pub fn check(&self) -> &Arc<Check> {
        &self.check
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CheckTimer {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn tick(check: Arc<Check>, due_tx: mpsc::Sender<Check>, stop: CancellationToken, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    sent = due_tx.send((*check).clone()) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    trace!(check_id = %check.id, "check timer stopped");
}

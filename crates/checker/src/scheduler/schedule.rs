use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use super::timer::CheckTimer;
use crate::error::CheckerError;
use crate::types::Check;

/// Id-keyed table of live check timers feeding a single due queue.
pub struct ScheduleMap {
    timers: RwLock<HashMap<String, CheckTimer>>,
    due_tx: Mutex<Option<mpsc::Sender<Check>>>,
}

impl ScheduleMap {
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<Check>) {
        let (due_tx, due_rx) = mpsc::channel(depth.max(1));
        let schedule = Self {
            timers: RwLock::new(HashMap::new()),
            due_tx: Mutex::new(Some(due_tx)),
        };
        (schedule, due_rx)
    }

    fn sender(&self) -> Option<mpsc::Sender<Check>> {
        self.due_tx.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Schedule `check`, replacing (and stopping) any timer under the same
    /// id, then queue it for an immediate first run.
    ///
    /// The immediate push waits for room on the due queue.
    pub async fn set(&self, check: Check) -> Result<Arc<Check>, CheckerError> {
        let due_tx = self.sender().ok_or(CheckerError::SchedulerStopped)?;
        let timer = CheckTimer::start(check, due_tx.clone());
        let check = timer.check().clone();

        let previous = self
            .timers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(check.id.clone(), timer);
        if let Some(previous) = previous {
            debug!(check_id = %check.id, "replacing scheduled check");
            previous.stop();
        }

        due_tx
            .send((*check).clone())
            .await
            .map_err(|_| CheckerError::SchedulerStopped)?;
        Ok(check)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Check>> {
        let timers = self.timers.read().unwrap_or_else(PoisonError::into_inner);
        timers.get(id).map(|timer| timer.check().clone())
    }

    pub fn delete(&self, id: &str) -> Option<Arc<Check>> {
        let timer = self
            .timers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)?;
        timer.stop();
        Some(timer.check().clone())
    }

    pub fn len(&self) -> usize {
        self.timers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every timer and release the due queue sender.
    pub fn destroy(&self) {
        self.due_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        let timers: Vec<CheckTimer> = self
            .timers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, timer)| timer)
            .collect();
        for timer in &timers {
            timer.stop();
        }
        debug!(count = timers.len(), "schedule destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_pushes_immediately() {
        let (schedule, mut due) = ScheduleMap::new(10);
        schedule.set(Check::new("a", 60)).await.unwrap();

        assert_eq!(due.recv().await.unwrap().id, "a");
        assert_eq!(schedule.len(), 1);
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let (schedule, _due) = ScheduleMap::new(10);
        schedule.set(Check::new("a", 60)).await.unwrap();
        schedule.set(Check::new("a", 120)).await.unwrap();

        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.get("a").unwrap().interval, 120);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (schedule, _due) = ScheduleMap::new(10);
        schedule.set(Check::new("a", 60)).await.unwrap();

        assert!(schedule.delete("a").is_some());
        assert!(schedule.delete("a").is_none());
        assert!(schedule.get("a").is_none());
    }

    #[tokio::test]
    async fn test_destroy_rejects_new_checks() {
        let (schedule, _due) = ScheduleMap::new(10);
        schedule.set(Check::new("a", 60)).await.unwrap();
        schedule.destroy();

        assert!(schedule.is_empty());
        assert!(matches!(
            schedule.set(Check::new("b", 60)).await,
            Err(CheckerError::SchedulerStopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks() {
        let (schedule, mut due) = ScheduleMap::new(10);
        schedule.set(Check::new("a", 15)).await.unwrap();
        assert_eq!(due.recv().await.unwrap().id, "a");

        let ticked = tokio::time::timeout(std::time::Duration::from_secs(16), due.recv()).await;
        assert_eq!(ticked.unwrap().unwrap().id, "a");
    }
}

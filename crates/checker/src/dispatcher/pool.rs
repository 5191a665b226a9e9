use std::ops::Deref;

use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use super::worker::{NewWorkerFn, Worker};

/// Fixed set of idle workers for a single task type.
pub(crate) struct WorkerPool {
    task_type: String,
    size: usize,
    idle_tx: mpsc::Sender<Box<dyn Worker>>,
    idle_rx: Mutex<mpsc::Receiver<Box<dyn Worker>>>,
}

impl WorkerPool {
    pub(crate) fn new(task_type: &str, recruit: &NewWorkerFn, size: usize) -> Self {
        let size = size.max(1);
        let (idle_tx, idle_rx) = mpsc::channel(size);
        for _ in 0..size {
            if idle_tx.try_send(recruit()).is_err() {
                break;
            }
        }
        Self {
            task_type: task_type.to_string(),
            size,
            idle_tx,
            idle_rx: Mutex::new(idle_rx),
        }
    }

    /// Wait for an idle worker. Waiters are served in arrival order.
    pub(crate) async fn acquire(&self) -> Option<PooledWorker> {
        let mut idle = self.idle_rx.lock().await;
        let worker = idle.recv().await?;
        Some(PooledWorker {
            worker: Some(worker),
            home: self.idle_tx.clone(),
            task_type: self.task_type.clone(),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Workers currently sitting in the idle queue.
    pub(crate) fn idle(&self) -> usize {
        self.idle_tx.max_capacity() - self.idle_tx.capacity()
    }
}

/// A worker checked out of its pool. Dropping it puts the worker back.
pub(crate) struct PooledWorker {
    worker: Option<Box<dyn Worker>>,
    home: mpsc::Sender<Box<dyn Worker>>,
    task_type: String,
}

impl Deref for PooledWorker {
    type Target = dyn Worker;

    fn deref(&self) -> &Self::Target {
        match &self.worker {
            Some(worker) => worker.as_ref(),
            None => unreachable!("pooled worker used after release"),
        }
    }
}

impl Drop for PooledWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            if self.home.try_send(worker).is_err() {
                warn!(task_type = %self.task_type, "worker pool closed, dropping worker");
            }
        }
    }
}

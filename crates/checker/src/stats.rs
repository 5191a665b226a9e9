use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters reported by the heartbeat.
#[derive(Debug, Default)]
pub struct CheckerStats {
    scheduled_checks: AtomicU64,
    tasks_dispatched: AtomicU64,
    results_published: AtomicU64,
    resolver_errors: AtomicU64,
    publish_errors: AtomicU64,
}

impl CheckerStats {
    pub fn set_scheduled_checks(&self, count: usize) {
        self.scheduled_checks.store(count as u64, Ordering::Relaxed);
    }

    pub fn task_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn result_published(&self) {
        self.results_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resolver_error(&self) {
        self.resolver_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        [
            ("scheduled_checks", &self.scheduled_checks),
            ("tasks_dispatched", &self.tasks_dispatched),
            ("results_published", &self.results_published),
            ("resolver_errors", &self.resolver_errors),
            ("publish_errors", &self.publish_errors),
        ]
        .into_iter()
        .map(|(name, counter)| (name.to_string(), counter.load(Ordering::Relaxed)))
        .collect()
    }
}

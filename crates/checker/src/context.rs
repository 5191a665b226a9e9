//! Cancellation scope threaded through every dispatch.
//!
//! A [`RunContext`] is a cheap, cloneable handle. Children inherit
//! cancellation from their parent and can only tighten the deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    max_hosts: Option<usize>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RunContext {
    /// A root context with no deadline that is never cancelled unless asked to.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            max_hosts: None,
        }
    }

    /// Derive a context that is cancelled together with this one but can be
    /// cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            max_hosts: self.max_hosts,
        }
    }

    /// Set a deadline, keeping the earlier one if a deadline already exists.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cap the number of targets a runner will dispatch under this context.
    pub fn with_max_hosts(mut self, max_hosts: usize) -> Self {
        self.max_hosts = Some(max_hosts);
        self
    }

    pub fn max_hosts(&self) -> Option<usize> {
        self.max_hosts
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `None` while the context is live, otherwise the reason it is done.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        let ctx = RunContext::background();
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.max_hosts(), None);
    }

    #[test]
    fn test_child_inherits_cancellation() {
        let parent = RunContext::background();
        let child = parent.child();
        parent.cancel();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
    }

    #[test]
    fn test_child_cancel_leaves_parent_live() {
        let parent = RunContext::background();
        let child = parent.child();
        child.cancel();
        assert_eq!(parent.err(), None);
        assert_eq!(child.err(), Some(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn test_past_deadline() {
        let ctx = RunContext::background().with_deadline(Instant::now() - Duration::from_secs(1));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_deadline_only_tightens() {
        let soon = Instant::now() + Duration::from_secs(1);
        let ctx = RunContext::background()
            .with_deadline(soon)
            .with_timeout(Duration::from_secs(3600));
        assert_eq!(ctx.deadline(), Some(soon));
    }
}

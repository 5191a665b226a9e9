use serde::Serialize;
use thiserror::Error;

use crate::context::ContextError;

/// Failure recorded on a single dispatched task.
///
/// Cloneable and comparable so a finished task can carry it by value and
/// callers can match it against the context error that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("Unregistered worker type: {0}")]
    UnregisteredWorker(String),
    #[error("Unable to process request of type {0}")]
    UnsupportedRequest(String),
    #[error("{0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("Check has null ID")]
    MissingId,
    #[error("Check interval below threshold ({minimum} minimum): {interval}")]
    IntervalTooShort { minimum: u64, interval: u64 },
    #[error("Check has null target")]
    MissingTarget,
    #[error("Check has null Spec")]
    MissingSpec,
    #[error("Non-existent check: {0}")]
    NonExistentCheck(String),
    #[error("No valid targets resolved from {0}")]
    NoTargets(String),
    #[error("Unable to resolve target: {0}")]
    UnresolvableTarget(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Deadline required but missing in context")]
    MissingDeadline,
    #[error("Unknown CloudWatch namespace: {0}")]
    UnknownNamespace(String),
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("Scheduler already started")]
    AlreadyStarted,
    #[error("Scheduler stopped")]
    SchedulerStopped,
    #[error("No subscribers for topic {0}")]
    NoSubscribers(String),
    #[error("Publisher stopped")]
    PublisherStopped,
    #[error("Slate responded with status {0}")]
    SlateStatus(u16),
    #[error("Metric statistics unavailable: {0}")]
    MetricSource(String),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Tls(#[from] rustls::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CheckerError {
    /// Short machine-readable name used as the `type` of a published error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingId | Self::IntervalTooShort { .. } | Self::MissingTarget | Self::MissingSpec => {
                "validation"
            }
            Self::NonExistentCheck(_) => "not_found",
            Self::NoTargets(_) | Self::UnresolvableTarget(_) | Self::InvalidTarget(_) => "resolver",
            Self::Context(_) | Self::MissingDeadline | Self::Timeout(_) => "context",
            Self::Http(_)
            | Self::WebSocket(_)
            | Self::Tls(_)
            | Self::Url(_)
            | Self::InvalidHeader { .. }
            | Self::InvalidMethod(_) => "request",
            Self::Json(_) => "encoding",
            _ => "error",
        }
    }
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    error: String,
}

/// Render an error as the JSON string published in place of a response.
pub fn handle_error(err: &CheckerError) -> String {
    let payload = ErrorPayload {
        kind: err.kind(),
        error: err.to_string(),
    };
    serde_json::to_string(&payload).unwrap_or_else(|_| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_error_shape() {
        let rendered = handle_error(&CheckerError::NoTargets("sg:sg-1".into()));
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["type"], "resolver");
        assert_eq!(value["error"], "No valid targets resolved from sg:sg-1");
    }

    #[test]
    fn test_task_error_from_context() {
        let err: TaskError = ContextError::DeadlineExceeded.into();
        assert_eq!(err.to_string(), "context deadline exceeded");
    }

    #[test]
    fn test_interval_message() {
        let err = CheckerError::IntervalTooShort { minimum: 15, interval: 5 };
        assert_eq!(err.to_string(), "Check interval below threshold (15 minimum): 5");
    }
}

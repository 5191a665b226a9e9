//! Wire types shared by the scheduler, runners and RPC surface.

mod check;
mod response;

pub use check::{Assertion, Check, CheckSpec, CloudWatchCheck, CloudWatchMetric, Header, HttpCheck, Target};
pub use response::{CheckResponse, CheckResult, CloudWatchResponse, HttpResponse, Metric, MetricError, ResponsePayload};

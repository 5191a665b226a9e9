//! Worker implementations for each supported request type.

mod cloudwatch;
mod http;

pub use cloudwatch::{
    CloudWatchRequest, CloudWatchWorker, Datapoint, Dimension, MetricStatisticsInput,
    MetricStatisticsSource, UnavailableMetricSource, dimensions_for,
};
pub use http::{HttpClientConfig, HttpRequest, HttpWorker};

pub const HTTP_TASK_TYPE: &str = "HTTPRequest";
pub const CLOUDWATCH_TASK_TYPE: &str = "CloudWatchRequest";

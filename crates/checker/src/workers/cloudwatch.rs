//! CloudWatch metric statistics probe.
//!
//! The AWS call itself sits behind [`MetricStatisticsSource`] so the worker
//! can be driven by any backend that speaks `GetMetricStatistics`.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, warn};

use crate::context::RunContext;
use crate::dispatcher::{Request, Response, Task, Worker, run_in_context};
use crate::error::{CheckerError, TaskError};
use crate::types::{CloudWatchCheck, CloudWatchMetric, CloudWatchResponse, Metric, MetricError, ResponsePayload, Target};

pub const STATISTICS_PERIOD_SECS: u32 = 60;
/// How many check intervals of history each request covers.
const LOOKBACK_INTERVALS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricStatisticsInput {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub period: u32,
    pub statistics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub unit: String,
    pub average: Option<f64>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
    pub sample_count: Option<f64>,
    pub sum: Option<f64>,
}

impl Datapoint {
    /// Value of a named statistic. `None` for statistics CloudWatch does not
    /// define.
    pub fn statistic(&self, name: &str) -> Option<f64> {
        let value = match name {
            "Average" => self.average,
            "Maximum" => self.maximum,
            "Minimum" => self.minimum,
            "SampleCount" => self.sample_count,
            "Sum" => self.sum,
            _ => return None,
        };
        Some(value.unwrap_or_default())
    }
}

#[async_trait::async_trait]
pub trait MetricStatisticsSource: Send + Sync {
    async fn get_metric_statistics(&self, input: MetricStatisticsInput) -> Result<Vec<Datapoint>, CheckerError>;
}

/// Backend used when no CloudWatch credentials are configured.
#[derive(Debug, Default)]
pub struct UnavailableMetricSource;

#[async_trait::async_trait]
impl MetricStatisticsSource for UnavailableMetricSource {
    async fn get_metric_statistics(&self, input: MetricStatisticsInput) -> Result<Vec<Datapoint>, CheckerError> {
        Err(CheckerError::MetricSource(format!(
            "no CloudWatch backend configured for {}",
            input.namespace
        )))
    }
}

/// Dimensions identifying `target` within `namespace`.
pub fn dimensions_for(namespace: &str, target: &Target) -> Result<Vec<Dimension>, CheckerError> {
    let name = match namespace {
        "AWS/EC2" => "InstanceId",
        "AWS/RDS" => "DBInstanceIdentifier",
        "AWS/ELB" => "LoadBalancerName",
        "AWS/AutoScaling" => "AutoScalingGroupName",
        "AWS/ECS" => {
            return Ok(vec![
                Dimension::new("ClusterName", &target.name),
                Dimension::new("ServiceName", &target.id),
            ]);
        }
        other => return Err(CheckerError::UnknownNamespace(other.to_string())),
    };
    Ok(vec![Dimension::new(name, &target.id)])
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudWatchRequest {
    pub target: Target,
    pub metrics: Vec<CloudWatchMetric>,
    pub namespace: String,
    pub statistics_interval_secs: u64,
    pub statistics_period: u32,
    pub statistics: Vec<String>,
}

impl CloudWatchRequest {
    pub fn for_target(check: &CloudWatchCheck, target: &Target, interval: u64) -> Self {
        Self {
            target: target.clone(),
            namespace: check.metrics.first().map(|m| m.namespace.clone()).unwrap_or_default(),
            metrics: check.metrics.clone(),
            statistics_interval_secs: interval * 2,
            statistics_period: STATISTICS_PERIOD_SECS,
            statistics: vec!["Average".to_string()],
        }
    }

    /// Fetch every metric. Per-metric failures are collected on the
    /// response rather than failing the whole request.
    pub async fn execute(&self, source: &dyn MetricStatisticsSource) -> Response {
        let end_time = Utc::now() - ChronoDuration::minutes(1);
        let lookback = self.statistics_interval_secs as i64 * LOOKBACK_INTERVALS;
        let start_time = end_time - ChronoDuration::seconds(lookback);

        let mut response = CloudWatchResponse {
            namespace: self.namespace.clone(),
            ..CloudWatchResponse::default()
        };

        for metric in &self.metrics {
            let input = match dimensions_for(&metric.namespace, &self.target) {
                Ok(dimensions) => MetricStatisticsInput {
                    namespace: metric.namespace.clone(),
                    metric_name: metric.name.clone(),
                    dimensions,
                    start_time,
                    end_time,
                    period: self.statistics_period,
                    statistics: self.statistics.clone(),
                },
                Err(err) => {
                    response.errors.push(MetricError {
                        metric: metric.name.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let mut datapoints = match source.get_metric_statistics(input).await {
                Ok(datapoints) if datapoints.is_empty() => {
                    response.errors.push(MetricError {
                        metric: metric.name.clone(),
                        error: "no datapoints".to_string(),
                    });
                    continue;
                }
                Ok(datapoints) => datapoints,
                Err(err) => {
                    error!(metric = %metric.name, target = %self.target, error = %err, "could not get metric statistics");
                    response.errors.push(MetricError {
                        metric: metric.name.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            datapoints.sort_by_key(|d| d.timestamp);
            for datapoint in &datapoints {
                for statistic in &self.statistics {
                    match datapoint.statistic(statistic) {
                        Some(value) => response.metrics.push(Metric {
                            name: metric.name.clone(),
                            value,
                            unit: datapoint.unit.clone(),
                            statistic: statistic.clone(),
                            timestamp: Some(datapoint.timestamp),
                        }),
                        None => warn!(statistic = %statistic, "unknown statistic"),
                    }
                }
            }
        }

        Response::ok(ResponsePayload::CloudWatch(response))
    }
}

pub struct CloudWatchWorker {
    source: Arc<dyn MetricStatisticsSource>,
}

impl CloudWatchWorker {
    pub fn new(source: Arc<dyn MetricStatisticsSource>) -> Self {
        Self { source }
    }
}

#[async_trait::async_trait]
impl Worker for CloudWatchWorker {
    async fn work(&self, ctx: &RunContext, task: Task) -> Task {
        let response = match &task.request {
            Request::CloudWatch(request) => run_in_context(ctx, request.execute(self.source.as_ref())).await,
            other => Response::error(TaskError::UnsupportedRequest(other.task_type().to_string())),
        };
        task.respond(response)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::check::{Check, Header, Target};
use crate::PROTO_VERSION;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub statistic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Metric {
    /// Request latency in milliseconds.
    pub fn latency(elapsed: Duration) -> Self {
        Self {
            name: "request_latency".to_string(),
            value: elapsed.as_secs_f64() * 1000.0,
            unit: "ms".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl HttpResponse {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| h.values.first())
            .map(String::as_str)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricError {
    pub metric: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudWatchResponse {
    pub namespace: String,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub errors: Vec<MetricError>,
}

/// Payload a worker attaches to a successfully processed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsePayload {
    #[serde(rename = "http")]
    Http(HttpResponse),
    #[serde(rename = "cloudwatch")]
    CloudWatch(CloudWatchResponse),
}

/// Outcome of running a check against one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default)]
    pub passing: bool,
}

/// Everything a runner publishes after one execution of a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub customer_id: String,
    pub check_id: String,
    pub check_name: String,
    pub target: Option<Target>,
    pub timestamp: DateTime<Utc>,
    pub responses: Vec<CheckResponse>,
    pub passing: bool,
    pub version: i32,
}

impl CheckResult {
    /// Passing only when there is at least one response and every response
    /// passed.
    pub fn new(customer_id: &str, check: &Check, responses: Vec<CheckResponse>) -> Self {
        let passing = !responses.is_empty() && responses.iter().all(|r| r.passing);
        Self {
            customer_id: customer_id.to_string(),
            check_id: check.id.clone(),
            check_name: check.name.clone(),
            target: check.target.clone(),
            timestamp: Utc::now(),
            responses,
            passing,
            version: PROTO_VERSION,
        }
    }

    /// A result carrying a single failed response for the check's own target.
    pub fn failed(customer_id: &str, check: &Check, error: String) -> Self {
        let response = CheckResponse {
            target: check.target.clone().unwrap_or_default(),
            response: None,
            error,
            passing: false,
        };
        Self::new(customer_id, check, vec![response])
    }
}

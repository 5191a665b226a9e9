//! CloudWatch requests driven by a scripted metrics backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use checker::workers::{
    CLOUDWATCH_TASK_TYPE, CloudWatchRequest, CloudWatchWorker, Datapoint, Dimension, MetricStatisticsInput,
    MetricStatisticsSource,
};
use checker::{
    Check, CheckSpec, CheckerError, CloudWatchCheck, CloudWatchMetric, CloudWatchResponse, Dispatcher,
    ResponsePayload, RunContext, Runner, Target, WorkerRegistry,
};

#[derive(Default)]
struct ScriptedSource {
    datapoints: HashMap<String, Vec<Datapoint>>,
    inputs: Mutex<Vec<MetricStatisticsInput>>,
}

#[async_trait::async_trait]
impl MetricStatisticsSource for ScriptedSource {
    async fn get_metric_statistics(&self, input: MetricStatisticsInput) -> Result<Vec<Datapoint>, CheckerError> {
        let datapoints = self.datapoints.get(&input.metric_name).cloned();
        self.inputs.lock().unwrap().push(input.clone());
        datapoints.ok_or_else(|| CheckerError::MetricSource(format!("throttled: {}", input.metric_name)))
    }
}

fn datapoint(minute: u32, average: f64) -> Datapoint {
    Datapoint {
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap(),
        unit: "Percent".into(),
        average: Some(average),
        ..Datapoint::default()
    }
}

fn metric(namespace: &str, name: &str) -> CloudWatchMetric {
    CloudWatchMetric {
        namespace: namespace.into(),
        name: name.into(),
    }
}

fn cloudwatch(response: checker::dispatcher::Response) -> CloudWatchResponse {
    match response.payload {
        Some(ResponsePayload::CloudWatch(cw)) => cw,
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_datapoints_sorted_and_window_computed() {
    let mut source = ScriptedSource::default();
    source.datapoints.insert(
        "CPUUtilization".into(),
        vec![datapoint(3, 30.0), datapoint(1, 10.0), datapoint(2, 20.0)],
    );

    let check = CloudWatchCheck {
        metrics: vec![metric("AWS/EC2", "CPUUtilization")],
    };
    let request = CloudWatchRequest::for_target(&check, &Target::new("instance", "i-1"), 30);
    let response = cloudwatch(request.execute(&source).await);

    let values: Vec<f64> = response.metrics.iter().map(|m| m.value).collect();
    assert_eq!(values, vec![10.0, 20.0, 30.0]);
    assert_eq!(response.metrics[0].statistic, "Average");
    assert!(response.errors.is_empty());

    let inputs = source.inputs.lock().unwrap();
    let input = &inputs[0];
    assert_eq!(input.namespace, "AWS/EC2");
    assert_eq!(
        input.dimensions,
        vec![Dimension {
            name: "InstanceId".into(),
            value: "i-1".into()
        }]
    );
    assert_eq!(input.period, 60);
    assert_eq!(input.end_time - input.start_time, Duration::seconds(600));
    assert!(input.end_time <= Utc::now() - Duration::seconds(59));
}

#[tokio::test]
async fn test_per_metric_failures_collected() {
    let mut source = ScriptedSource::default();
    source.datapoints.insert("CPUUtilization".into(), vec![datapoint(1, 5.0)]);
    source.datapoints.insert("NetworkIn".into(), Vec::new());

    let check = CloudWatchCheck {
        metrics: vec![
            metric("AWS/EC2", "CPUUtilization"),
            metric("AWS/Lambda", "Invocations"),
            metric("AWS/EC2", "DiskReadOps"),
            metric("AWS/EC2", "NetworkIn"),
        ],
    };
    let request = CloudWatchRequest::for_target(&check, &Target::new("instance", "i-1"), 30);
    let response = cloudwatch(request.execute(&source).await);

    assert_eq!(response.metrics.len(), 1);
    let failed: Vec<&str> = response.errors.iter().map(|e| e.metric.as_str()).collect();
    assert_eq!(failed, vec!["Invocations", "DiskReadOps", "NetworkIn"]);
    assert!(response.errors[0].error.contains("AWS/Lambda"));
}

#[tokio::test]
async fn test_runner_dispatches_cloudwatch_checks() {
    let mut source = ScriptedSource::default();
    source.datapoints.insert("CPUUtilization".into(), vec![datapoint(1, 42.0)]);
    let source: Arc<dyn MetricStatisticsSource> = Arc::new(source);

    let mut registry = WorkerRegistry::new();
    registry.register(CLOUDWATCH_TASK_TYPE, move || Box::new(CloudWatchWorker::new(source.clone())));
    let runner = Runner::new(Dispatcher::new(&registry, 2));

    let check = Check::new("cw-1", 30)
        .with_target(Target::new("instance", "i-1"))
        .with_spec(CheckSpec::CloudWatch(CloudWatchCheck {
            metrics: vec![metric("AWS/EC2", "CPUUtilization")],
        }));
    let responses = runner
        .run_check(&RunContext::background(), &check, vec![Target::new("instance", "i-1")])
        .await
        .unwrap();

    assert_eq!(responses.len(), 1);
    assert!(responses[0].error.is_empty());
    let payload = responses[0].response.as_ref().unwrap();
    assert_eq!(payload["type"], "cloudwatch");
    assert_eq!(payload["metrics"][0]["value"], 42.0);
    assert!(!responses[0].passing);
}

//! The RPC-facing checker service.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use checker::checker::{CheckResourceRequest, TestCheckRequest};
use checker::dispatcher::MAX_WORKERS_PER_TYPE;
use checker::workers::{HttpClientConfig, UnavailableMetricSource};
use checker::{Check, Checker, CheckerError, Dispatcher, MemoryBus, Resolver, Runner, Scheduler, WorkerRegistry};
use common::{StaticResolver, http_check, http_response, instance, serve};

fn checker_with(resolver: Arc<dyn Resolver>) -> Checker {
    let registry = WorkerRegistry::with_defaults(HttpClientConfig::default(), Arc::new(UnavailableMetricSource));
    let runner = Arc::new(Runner::new(Dispatcher::new(&registry, MAX_WORKERS_PER_TYPE)));
    let scheduler = Arc::new(Scheduler::new(resolver.clone(), Arc::new(MemoryBus::new())));
    scheduler.start().unwrap();
    Checker::new(scheduler, runner, resolver)
}

fn local_targets(n: usize) -> Arc<dyn Resolver> {
    Arc::new(StaticResolver {
        targets: (0..n).map(|i| instance(i, "127.0.0.1")).collect(),
    })
}

fn test_request(check: Check, max_hosts: usize) -> TestCheckRequest {
    TestCheckRequest {
        check,
        max_hosts,
        deadline: Some(Utc::now() + Duration::seconds(10)),
    }
}

#[tokio::test]
async fn test_deadline_required() {
    let checker = checker_with(local_targets(1));
    let request = TestCheckRequest {
        check: http_check("check-1", 80),
        ..TestCheckRequest::default()
    };
    let err = checker.test_check(request).await.unwrap_err();
    assert!(matches!(err, CheckerError::MissingDeadline));
}

#[tokio::test]
async fn test_check_runs_every_target() {
    let (addr, _) = serve(http_response("200 OK", &[], b"ok")).await;
    let checker = checker_with(local_targets(3));

    let response = checker
        .test_check(test_request(http_check("check-1", addr.port()), 0))
        .await
        .unwrap();

    assert!(response.error.is_empty());
    assert_eq!(response.responses.len(), 3);
    assert!(response.responses.iter().all(|r| r.error.is_empty()));
}

#[tokio::test]
async fn test_check_honours_max_hosts() {
    let (addr, _) = serve(http_response("200 OK", &[], b"ok")).await;
    let checker = checker_with(local_targets(3));

    let response = checker
        .test_check(test_request(http_check("check-1", addr.port()), 1))
        .await
        .unwrap();
    assert_eq!(response.responses.len(), 1);
}

#[tokio::test]
async fn test_check_defaults_to_max_test_targets() {
    let (addr, hits) = serve(http_response("200 OK", &[], b"ok")).await;
    let checker = checker_with(local_targets(8));

    let response = checker
        .test_check(test_request(http_check("check-1", addr.port()), 0))
        .await
        .unwrap();
    assert_eq!(response.responses.len(), 5);
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_check_with_past_deadline() {
    let checker = checker_with(local_targets(3));
    let request = TestCheckRequest {
        check: http_check("check-1", 1),
        max_hosts: 0,
        deadline: Some(Utc::now() - Duration::seconds(1)),
    };

    let response = checker.test_check(request).await.unwrap();
    assert_eq!(response.responses.len(), 3);
    for response in &response.responses {
        assert_eq!(response.error, "context deadline exceeded");
    }
}

#[tokio::test]
async fn test_resolution_failure_reported_in_response() {
    let checker = checker_with(local_targets(0));

    let response = checker
        .test_check(test_request(http_check("check-1", 80), 0))
        .await
        .unwrap();
    assert!(response.responses.is_empty());
    let error: serde_json::Value = serde_json::from_str(&response.error).unwrap();
    assert_eq!(error["error"], "No valid targets resolved from sg:sg-test");
}

#[tokio::test]
async fn test_batch_crud() {
    let checker = checker_with(local_targets(1));
    let valid = http_check("check-1", 80);
    let mut invalid = http_check("check-2", 80);
    invalid.interval = 5;

    let created = checker
        .create_check(&CheckResourceRequest {
            checks: vec![valid.clone(), invalid.clone()],
        })
        .await;
    assert_eq!(created.responses.len(), 2);
    assert_eq!(created.responses[0].check.as_ref(), Some(&valid));
    assert!(created.responses[0].error.is_empty());
    assert_eq!(
        created.responses[1].error,
        "Check interval below threshold (15 minimum): 5"
    );

    let request = CheckResourceRequest { checks: vec![valid.clone()] };
    let retrieved = checker.retrieve_check(&request);
    assert_eq!(retrieved.responses[0].check.as_ref(), Some(&valid));

    let deleted = checker.delete_check(&request);
    assert_eq!(deleted.responses[0].id, "check-1");
    assert!(deleted.responses[0].error.is_empty());

    let missing = checker.retrieve_check(&request);
    assert_eq!(missing.responses[0].error, "Non-existent check: check-1");
}

#[tokio::test]
async fn test_update_replaces_or_creates() {
    let checker = checker_with(local_targets(1));
    let mut check = http_check("check-1", 80);

    let updated = checker
        .update_check(&CheckResourceRequest { checks: vec![check.clone()] })
        .await;
    assert!(updated.responses[0].error.is_empty());

    check.interval = 120;
    checker
        .update_check(&CheckResourceRequest { checks: vec![check.clone()] })
        .await;

    let retrieved = checker.retrieve_check(&CheckResourceRequest { checks: vec![check] });
    assert_eq!(retrieved.responses[0].check.as_ref().unwrap().interval, 120);
    assert_eq!(checker.scheduler().len(), 1);
}

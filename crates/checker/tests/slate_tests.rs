//! Slate client retries and request shape.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use checker::slate::{AssertionEvaluator, SlateClient};
use checker::{Assertion, Check, CheckerError, RunContext};
use common::{http_response, serve, serve_fn, serve_recording};

fn check() -> Check {
    Check::new("check-1", 30).with_assertion(Assertion {
        key: "code".into(),
        relationship: "equal".into(),
        operand: "200".into(),
        ..Assertion::default()
    })
}

fn verdict(success: bool) -> Vec<u8> {
    let body = format!(r#"{{"success": {success}, "error": ""}}"#);
    http_response("200 OK", &[("Content-Type", "application/json")], body.as_bytes())
}

#[tokio::test]
async fn test_posts_assertions_and_response() {
    let (addr, requests) = serve_recording(verdict(true)).await;
    let client = SlateClient::new(format!("http://{addr}/check")).unwrap();

    let passing = client
        .check_assertions(&RunContext::background(), &check(), br#"{"type":"http","code":200}"#)
        .await
        .unwrap();
    assert!(passing);

    let seen = requests.lock().unwrap();
    let raw = &seen[0];
    let body_start = raw.find("\r\n\r\n").unwrap() + 4;
    let body: serde_json::Value = serde_json::from_str(&raw[body_start..]).unwrap();
    assert_eq!(body["assertions"][0]["key"], "code");
    assert_eq!(body["response"]["code"], 200);
}

#[tokio::test]
async fn test_failing_verdict() {
    let (addr, _) = serve(verdict(false)).await;
    let client = SlateClient::new(format!("http://{addr}/check")).unwrap();

    let passing = client
        .check_assertions(&RunContext::background(), &check(), b"{}")
        .await
        .unwrap();
    assert!(!passing);
}

#[tokio::test]
async fn test_retries_until_success() {
    let (addr, hits) = serve_fn(|attempt, _| match attempt {
        0 => None,
        1 => Some(http_response("500 Internal Server Error", &[], b"")),
        _ => Some(verdict(true)),
    })
    .await;
    let client = SlateClient::new(format!("http://{addr}/check")).unwrap();

    let passing = client
        .check_assertions(&RunContext::background(), &check(), b"{}")
        .await
        .unwrap();
    assert!(passing);
    assert!(hits.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let (addr, hits) = serve(http_response("503 Service Unavailable", &[], b"")).await;
    let client = SlateClient::new(format!("http://{addr}/check"))
        .unwrap()
        .with_max_retries(3);

    let err = client
        .check_assertions(&RunContext::background(), &check(), b"{}")
        .await
        .unwrap_err();
    assert!(matches!(err, CheckerError::SlateStatus(503)));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_deadline_interrupts_backoff() {
    let (addr, _) = serve(http_response("503 Service Unavailable", &[], b"")).await;
    let client = SlateClient::new(format!("http://{addr}/check")).unwrap();
    let ctx = RunContext::background().with_timeout(Duration::from_millis(100));

    let err = client.check_assertions(&ctx, &check(), b"{}").await.unwrap_err();
    assert!(matches!(err, CheckerError::Context(_)));
}

//! Shared fixtures: throwaway TCP servers and test doubles.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use checker::slate::AssertionEvaluator;
use checker::{Check, CheckSpec, CheckerError, HttpCheck, Resolver, RunContext, Target};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Build a raw HTTP/1.1 response.
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    let mut raw = head.into_bytes();
    raw.extend_from_slice(body);
    raw
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Read one request: the head plus however much body it advertises.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        request.extend_from_slice(&chunk[..read]);

        if let Some(end) = find(&request, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                break;
            }
        }
    }
    request
}

/// A server whose handler sees the connection number and the raw request.
/// Returning `None` closes the connection without answering.
pub async fn serve_fn<F>(handler: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(usize, &[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                if let Some(response) = handler(index, &request) {
                    let _ = socket.write_all(&response).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

/// A server answering every request with the same bytes.
pub async fn serve(response: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    serve_fn(move |_, _| Some(response.clone())).await
}

/// A server that records every request it sees.
pub async fn serve_recording(response: Vec<u8>) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let (addr, _) = serve_fn(move |_, request| {
        seen.lock().unwrap().push(String::from_utf8_lossy(request).into_owned());
        Some(response.clone())
    })
    .await;
    (addr, requests)
}

pub fn instance(n: usize, address: &str) -> Target {
    Target::new("instance", format!("i-{n}")).with_address(address)
}

pub fn http_check(id: &str, port: u16) -> Check {
    Check::new(id, 30)
        .with_target(Target::new("sg", "sg-test"))
        .with_spec(CheckSpec::Http(HttpCheck {
            name: "web".into(),
            path: "/health".into(),
            protocol: "http".into(),
            port,
            verb: "GET".into(),
            ..HttpCheck::default()
        }))
}

/// Resolves every target to the same fixed list.
pub struct StaticResolver {
    pub targets: Vec<Target>,
}

#[async_trait::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, _ctx: &RunContext, _target: &Target) -> Result<Vec<Target>, CheckerError> {
        Ok(self.targets.clone())
    }
}

pub struct FailingResolver;

#[async_trait::async_trait]
impl Resolver for FailingResolver {
    async fn resolve(&self, _ctx: &RunContext, target: &Target) -> Result<Vec<Target>, CheckerError> {
        Err(CheckerError::UnresolvableTarget(target.to_string()))
    }
}

/// Evaluator returning a fixed verdict and counting calls.
#[derive(Default)]
pub struct StubEvaluator {
    pub verdict: bool,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StubEvaluator {
    pub fn passing() -> Self {
        Self {
            verdict: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AssertionEvaluator for StubEvaluator {
    async fn check_assertions(&self, _ctx: &RunContext, _check: &Check, response: &[u8]) -> Result<bool, CheckerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        serde_json::from_slice::<serde_json::Value>(response)?;
        if self.fail {
            return Err(CheckerError::SlateStatus(500));
        }
        Ok(self.verdict)
    }
}

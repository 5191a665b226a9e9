use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use reqwest::header::{HOST, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, redirect};
use tracing::debug;
use url::Url;

use super::extract::{extract_headers, read_body};
use super::{BODY_READ_TIMEOUT, HttpClientConfig, websocket};
use crate::dispatcher::Response;
use crate::error::{CheckerError, TaskError};
use crate::types::{Header, HttpCheck, HttpResponse, Metric, ResponsePayload, Target};

/// A single HTTP probe against one concrete target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: String,
    /// Hostname presented in the Host header and used for TLS SNI while the
    /// connection itself goes to the address in `url`.
    pub host: String,
    pub insecure_skip_verify: bool,
}

impl HttpRequest {
    /// Build the probe an HTTP check performs against `target`.
    ///
    /// Only `host` targets carry a hostname worth verifying a certificate
    /// against; everything else is reached by bare address.
    pub fn for_target(check: &HttpCheck, target: &Target) -> Self {
        let (host, insecure_skip_verify) = if target.kind == "host" {
            let host = if target.name.is_empty() { &target.id } else { &target.name };
            (host.clone(), false)
        } else {
            (String::new(), true)
        };

        Self {
            method: check.verb.clone(),
            url: format!("{}://{}:{}{}", check.protocol, target.address, check.port, check.path),
            headers: check.headers.clone(),
            body: check.body.clone(),
            host,
            insecure_skip_verify,
        }
    }

    /// A ws(s) URL, or an `Upgrade: websocket` header on an http(s) URL.
    pub(crate) fn is_websocket(&self) -> bool {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            return true;
        }
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case("upgrade"))
            .and_then(|header| header.values.first())
            .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
    }

    /// Perform the probe. Transport failures become a task error; any HTTP
    /// status, redirects included, is a successful response.
    pub async fn execute(&self, config: &HttpClientConfig) -> Response {
        let result = if self.is_websocket() {
            websocket::exchange(self).await
        } else {
            self.perform(config).await
        };

        match result {
            Ok(response) => Response::ok(ResponsePayload::Http(response)),
            Err(err) => Response::error(TaskError::Request(err.to_string())),
        }
    }

    async fn perform(&self, config: &HttpClientConfig) -> Result<HttpResponse, CheckerError> {
        let mut url = Url::parse(&self.url)?;
        let mut builder = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .danger_accept_invalid_certs(self.insecure_skip_verify);

        if !self.host.is_empty() {
            if let Some(ip) = url.host_str().and_then(|h| h.trim_matches(['[', ']']).parse::<IpAddr>().ok()) {
                let port = url.port_or_known_default().unwrap_or(80);
                builder = builder.resolve(&self.host, SocketAddr::new(ip, port));
                url.set_host(Some(self.host.as_str()))?;
            }
        }

        let client = builder.build()?;
        let method = self.method()?;
        let headers = self.header_map()?;

        debug!(method = %method, url = %url, "performing http request");
        let started = Instant::now();
        let response = client
            .request(method, url)
            .headers(headers)
            .body(self.body.clone())
            .send()
            .await?;

        let code = response.status().as_u16();
        let headers = extract_headers(response.headers().iter().map(|(name, value)| (name.as_str(), value.as_bytes())));
        let body = read_body(response, config.max_content_length, BODY_READ_TIMEOUT).await;

        Ok(HttpResponse {
            code,
            body,
            headers,
            metrics: vec![Metric::latency(started.elapsed())],
        })
    }

    fn method(&self) -> Result<Method, CheckerError> {
        if self.method.is_empty() {
            return Ok(Method::GET);
        }
        Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| CheckerError::InvalidMethod(self.method.clone()))
    }

    /// Request headers, with an explicit Host override taking precedence
    /// over any Host header the check supplied.
    fn header_map(&self) -> Result<HeaderMap, CheckerError> {
        let mut map = HeaderMap::new();
        for header in &self.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|err| CheckerError::InvalidHeader {
                name: header.name.clone(),
                reason: err.to_string(),
            })?;
            for value in &header.values {
                let value = HeaderValue::from_str(value).map_err(|err| CheckerError::InvalidHeader {
                    name: header.name.clone(),
                    reason: err.to_string(),
                })?;
                map.append(name.clone(), value);
            }
        }

        if !self.host.is_empty() {
            let host = HeaderValue::from_str(&self.host).map_err(|err| CheckerError::InvalidHeader {
                name: HOST.to_string(),
                reason: err.to_string(),
            })?;
            map.insert(HOST, host);
        }
        Ok(map)
    }
}

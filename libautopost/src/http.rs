//! HTTP transport abstraction for provider clients
//!
//! Provider clients never talk to reqwest directly. They build an
//! [`HttpRequest`] and hand it to an [`HttpTransport`], which keeps the REST
//! quirks of each provider testable without network access:
//!
//! - [`ReqwestTransport`] is the production implementation with a request timeout.
//! - [`StubTransport`] answers from scripted routes and records every request.
//!   It is available in all builds so integration tests can use it.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
        }
    }

    pub fn post(url: Url) -> Self {
        Self {
            method: Method::Post,
            url,
        }
    }

    /// Scheme, host and path of the request, without the query string
    pub fn endpoint(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

    /// First value of a query parameter
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// The request was aborted by its deadline rather than failing on the wire
    pub timed_out: bool,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport used in production
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests are aborted after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    let timed_out = error.is_timeout();
    // The URL carries tokens and secrets in its query string
    TransportError {
        message: error.without_url().to_string(),
        timed_out,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone)]
enum StubReply {
    Respond { status: u16, body: String },
    Fail { message: String, timed_out: bool },
}

#[derive(Debug, Clone)]
struct StubRoute {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    reply: StubReply,
}

impl StubRoute {
    fn matches(&self, request: &HttpRequest) -> bool {
        self.method == request.method
            && self.path == request.url.path()
            && self.query.iter().all(|(key, value)| {
                request
                    .url
                    .query_pairs()
                    .any(|(k, v)| k == key.as_str() && v == value.as_str())
            })
    }
}

/// Scripted transport for tests
///
/// Routes match on method and path, optionally narrowed by required query
/// pairs. Routes are tried in registration order, so narrower routes should
/// be registered before catch-all ones. Unmatched requests get a 404.
#[derive(Debug, Default)]
pub struct StubTransport {
    routes: Vec<StubRoute>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with the given status and body
    pub fn respond(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.respond_when(method, path, &[], status, body)
    }

    /// Answer `method path` only when every `(key, value)` pair is in the query
    pub fn respond_when(
        mut self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        status: u16,
        body: &str,
    ) -> Self {
        self.routes.push(StubRoute {
            method,
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reply: StubReply::Respond {
                status,
                body: body.to_string(),
            },
        });
        self
    }

    /// Fail `method path` with a transport error
    pub fn fail(mut self, method: Method, path: &str, message: &str) -> Self {
        self.routes.push(StubRoute {
            method,
            path: path.to_string(),
            query: Vec::new(),
            reply: StubReply::Fail {
                message: message.to_string(),
                timed_out: false,
            },
        });
        self
    }

    /// Fail `method path` as if the request deadline expired
    pub fn time_out(mut self, method: Method, path: &str) -> Self {
        self.routes.push(StubRoute {
            method,
            path: path.to_string(),
            query: Vec::new(),
            reply: StubReply::Fail {
                message: "operation timed out".to_string(),
                timed_out: true,
            },
        });
        self
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let route = self.routes.iter().find(|route| route.matches(&request)).cloned();
        let description = format!("{} {}", request.method, request.url.path());

        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        match route.map(|route| route.reply) {
            Some(StubReply::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(StubReply::Fail { message, timed_out }) => {
                Err(TransportError { message, timed_out })
            }
            None => Ok(HttpResponse {
                status: 404,
                body: format!("no stub for {}", description),
            }),
        }
    }
}

//! HTTP transport abstraction for testability.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// HTTP methods used by the poetry API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    const fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request against the poetry API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Turns a non-2xx response into [`Error::UpstreamRejected`].
    ///
    /// # Errors
    ///
    /// Returns `UpstreamRejected` naming `endpoint` when the status is not 2xx.
    pub fn ensure_success(self, endpoint: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::UpstreamRejected {
                endpoint: endpoint.to_string(),
                status: self.status,
            })
        }
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Sends requests to the poetry API.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; `Err` means no response was obtained.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Default transport built on `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Builds a transport for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = build_http_client(config.timeout())
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the shared `reqwest` client.
    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builds a configured HTTP client for API requests.
fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let version = env!("CARGO_PKG_VERSION");
    reqwest::Client::builder()
        .user_agent(format!("daily-poetry/{version}"))
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(60))
        .build()
}

/// Encodes a request body as JSON. Failure is the caller's input, not the service's.
fn encode_body<T: Serialize + ?Sized>(body: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| Error::InvalidInput(format!("request body: {e}")))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), self.url(&request.path))
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(encode_body(body)?);
        }

        log::debug!("{:?} {}", request.method, request.path);
        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnavailable(e.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the module tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    type Responder = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync>;

    /// Transport that answers from per-route queues and records every request.
    ///
    /// A route is `"METHOD /path"`. When a route's queue holds one entry it is
    /// reused for every later call; unrouted requests fail as offline.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<Vec<(String, VecDeque<Responder>)>>,
        pub requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(
            &self,
            route: &str,
            responder: impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
        ) -> &Self {
            let mut routes = self.routes.lock().unwrap();
            if let Some((_, queue)) = routes.iter_mut().find(|(r, _)| r == route) {
                queue.push_back(Box::new(responder));
            } else {
                let mut queue: VecDeque<Responder> = VecDeque::new();
                queue.push_back(Box::new(responder));
                routes.push((route.to_string(), queue));
            }
            self
        }

        pub fn reply(&self, route: &str, status: u16, body: &str) -> &Self {
            let body = body.to_string();
            self.on(route, move |_| Ok(ApiResponse::new(status, body.clone())))
        }

        pub fn offline(&self, route: &str) -> &Self {
            self.on(route, |_| Err(Error::NetworkUnavailable("offline".to_string())))
        }

        pub fn count(&self, route: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| route_of(r) == route)
                .count()
        }
    }

    fn route_of(request: &ApiRequest) -> String {
        let method = match request.method {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        format!("{method} {}", request.path)
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let route = route_of(&request);
            let mut routes = self.routes.lock().unwrap();
            let Some((_, queue)) = routes.iter_mut().find(|(r, _)| *r == route) else {
                return Err(Error::NetworkUnavailable(format!("no route for {route}")));
            };
            if queue.len() > 1 {
                let responder = queue.pop_front().unwrap();
                responder(&request)
            } else {
                (queue.front().unwrap())(&request)
            }
        }
    }
}

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Minimal HTTP method enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Build a POST request with a JSON body.
    pub fn post_json<B: Serialize>(url: impl Into<String>, body: &B) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(body).map_err(|e| HttpError::Encode(e.to_string()))?;
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        })
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Lossy UTF-8 view of the body, truncated for log output.
    #[must_use]
    pub fn body_excerpt(&self, max_chars: usize) -> String {
        String::from_utf8_lossy(&self.body)
            .chars()
            .take(max_chars)
            .collect()
    }
}

#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("http request timed out: {0}")]
    Timeout(String),

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

impl HttpError {
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub mod reqwest_transport {
    use super::*;

    use std::time::Duration as StdDuration;

    /// A real HTTP transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    fn map_reqwest_error(e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(e.to_string())
        } else {
            HttpError::Transport(e.to_string())
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }

            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder.send().await.map_err(map_reqwest_error)?;

            let status = resp.status().as_u16();
            let mut headers: HttpHeaders = Vec::new();
            for (name, value) in resp.headers().iter() {
                headers.push((
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                ));
            }

            let body = resp.bytes().await.map_err(map_reqwest_error)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

pub use reqwest_transport::ReqwestTransport;

// ---------- Scripted mock transport ----------

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockTransport;

#[cfg(any(test, feature = "test-support"))]
mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory scripted transport.
    ///
    /// Responses (or errors) are queued per method + URL and returned in FIFO
    /// order. No sockets are opened.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        inner: Arc<Mutex<MockTransportInner>>,
    }

    #[derive(Default)]
    struct MockTransportInner {
        routes: HashMap<(HttpMethod, String), VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Vec<HttpRequest>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        fn push(&self, method: HttpMethod, url: String, outcome: Result<HttpResponse, HttpError>) {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner
                .routes
                .entry((method, url))
                .or_default()
                .push_back(outcome);
        }

        /// Queue a response for a method + URL.
        pub fn push_response(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            response: HttpResponse,
        ) {
            self.push(method, url.into(), Ok(response));
        }

        /// Queue a JSON response with the given status.
        pub fn push_json(
            &self,
            method: HttpMethod,
            url: impl Into<String>,
            status: u16,
            body: &serde_json::Value,
        ) {
            self.push_response(
                method,
                url,
                HttpResponse {
                    status,
                    headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                    body: body.to_string().into_bytes(),
                },
            );
        }

        /// Queue a transport-level failure.
        pub fn push_error(&self, method: HttpMethod, url: impl Into<String>, error: HttpError) {
            self.push(method, url.into(), Err(error));
        }

        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.requests.clone()
        }

        #[must_use]
        pub fn request_count(&self) -> usize {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.requests.len()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

            let key = (request.method, request.url.clone());
            inner.requests.push(request);

            match inner.routes.get_mut(&key).and_then(|q| q.pop_front()) {
                Some(outcome) => outcome,
                None => Err(HttpError::NoMockResponse {
                    method: key.0.as_str().to_string(),
                    url: key.1,
                }),
            }
        }
    }
}

//! HTTP transport seam
//!
//! The lifecycle only needs "send this request, give me a status and a
//! body, or tell me the exchange failed". Retrying transient failures is the
//! transport's job, not the lifecycle's: by the time a [`TransportError`]
//! reaches the client, retries are exhausted.

#[cfg(feature = "reqwest")]
mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(feature = "reqwest")]
pub use http::ReqwestTransport;

use crate::{config::TransportConfig, error::TransportError, runtime::sleep};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for the delay between retry attempts
const RETRY_DELAY_MAX: Duration = Duration::from_secs(5);

/// Media type used for every exchange with the registry
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Request body
    pub body: Option<String>,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl HttpRequest {
    /// Create a request that accepts JSON
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), JSON_MEDIA_TYPE.to_string());
        Self {
            method,
            url: url.into(),
            headers,
            body: None,
            timeout: Duration::from_millis(TransportConfig::default().timeout_ms),
        }
    }

    /// Set a JSON body
    pub fn with_json_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.headers
            .insert("Content-Type".to_string(), JSON_MEDIA_TYPE.to_string());
        self
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can carry an HTTP exchange to the registry
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport wrapper that retries failed exchanges with exponential backoff.
///
/// Only transport failures are retried. A response, whatever its status, is
/// returned as is. Invalid URLs fail immediately.
pub struct RetryingTransport<T> {
    inner: T,
    retries: u32,
    delay: Duration,
}

impl<T: Transport> RetryingTransport<T> {
    /// Wrap a transport using the configured retry policy
    pub fn new(inner: T, config: &TransportConfig) -> Self {
        Self {
            inner,
            retries: config.retries,
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// The wrapped transport
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0;
        let mut delay = self.delay;

        loop {
            match self.inner.send(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err @ TransportError::InvalidUrl { .. }) => return Err(err),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "{} {} failed (attempt {}/{}): {}",
                        request.method,
                        request.url,
                        attempt,
                        self.retries + 1,
                        err
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(RETRY_DELAY_MAX);
                }
                Err(err) => {
                    debug!("{} {} giving up after {} attempts", request.method, request.url, attempt + 1);
                    return Err(err);
                }
            }
        }
    }
}

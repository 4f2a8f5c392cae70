//! reqwest-backed transport
//!
//! reqwest drives its connections on tokio, so this transport must be used
//! from inside a tokio runtime.

use super::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::error::{Error, Result, TransportError};
use async_trait::async_trait;
use tracing::debug;

/// Production transport on top of `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a fresh connection pool
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(TransportError::request(e.to_string())))?;
        Ok(Self { client })
    }

    /// Reuse an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, &request))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(e, &request))?;

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse::new(status, body))
    }
}

fn classify(err: reqwest::Error, request: &HttpRequest) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            timeout_ms: request.timeout.as_millis() as u64,
        }
    } else if err.is_builder() {
        TransportError::InvalidUrl {
            url: request.url.clone(),
        }
    } else if err.is_connect() {
        TransportError::connection(err.to_string())
    } else {
        TransportError::request(err.to_string())
    }
}

//! Transport primitive under the resilient client.
//!
//! `Transport` is the seam tests mock; `HttpTransport` is the production
//! implementation over `reqwest`. Its cookie store carries the HttpOnly
//! credential and refresh cookies, so nothing above this layer touches them.

use std::time::Duration;

use super::config::ClientConfig;
use super::types::{ApiRequest, ApiResponse, ClientError, Method};

/// Executes one request and buffers the response. Any HTTP status is a
/// successful execution; only network-level failures are errors.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a cookie-aware HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::HttpClientBuild`] if the reqwest client fails to build.
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Build from the client config's base URL and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::HttpClientBuild`] if the reqwest client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.base_url, config.request_timeout, config.connect_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Put => self.http.put(url),
            Method::Patch => self.http.patch(url),
            Method::Delete => self.http.delete(url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

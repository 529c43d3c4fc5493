// HTTP transport
// The narrow request/response surface the auth subsystem depends on

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, SET_COOKIE, USER_AGENT};
use reqwest::{Client, Method, Request, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

/// Errors produced while talking to the server
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, timeout or protocol failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Decode the JSON body into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Value of the cookie `name` set by this response, if any
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| parse_set_cookie(header, name))
    }
}

/// Extract the value of `name` from a single `Set-Cookie` header
fn parse_set_cookie(header: &str, name: &str) -> Option<String> {
    let pair = header.split(';').next()?;
    let (key, value) = pair.split_once('=')?;
    if key.trim() != name {
        return None;
    }
    Some(value.trim().trim_matches('"').to_string())
}

/// Send an HTTP request and hand back the response.
///
/// Implementations resolve `path` against their base URL and fail with
/// [`TransportError::Status`] on non-2xx answers. No retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call_with_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        headers: HeaderMap,
    ) -> Result<Response, TransportError>;

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, TransportError> {
        self.call_with_headers(method, path, body, HeaderMap::new())
            .await
    }
}

/// reqwest-backed transport bound to one server
pub struct HttpTransport {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Server root, e.g. `https://ci.example.com`
    base_url: Url,

    user_agent: HeaderValue,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()?;

        let base_url = Url::parse(&config.server_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", config.server_url, e)))?;

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| TransportError::InvalidUrl(format!("bad user agent: {}", config.user_agent)))?;

        Ok(Self {
            client,
            base_url,
            user_agent,
        })
    }

    /// Resolve `path` against the server root
    pub fn url(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", joined, e)))
    }

    /// Build an unauthenticated request with body, content type and user agent set
    pub fn build(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Request, TransportError> {
        let mut builder = self
            .client
            .request(method, self.url(path)?)
            .header(USER_AGENT, self.user_agent.clone());

        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        Ok(builder.build()?)
    }

    /// Dispatch a prepared request and read the whole response
    pub async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");

        let response = self.client.execute(request).await.map_err(|e| {
            tracing::warn!(error = %e, url = %url, "HTTP request error");
            e
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        tracing::debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let message = String::from_utf8_lossy(&body).into_owned();
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                response_body = %message,
                "HTTP request failed with error response"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call_with_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        headers: HeaderMap,
    ) -> Result<Response, TransportError> {
        let mut request = self.build(method, path, body)?;
        request.headers_mut().extend(headers);
        self.execute(request).await
    }
}

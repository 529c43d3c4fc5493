// In-memory transport for auth unit tests

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::transport::{Response, Transport, TransportError};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

#[derive(Clone)]
enum Canned {
    Ok { body: String, cookie: Option<String> },
    Status { status: u16, message: String },
}

/// Answers by path and records every call
#[derive(Default)]
pub struct MockTransport {
    canned: HashMap<String, Canned>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, path: &str, body: &str) -> Self {
        self.canned.insert(
            path.to_string(),
            Canned::Ok {
                body: body.to_string(),
                cookie: None,
            },
        );
        self
    }

    pub fn respond_with_cookie(mut self, path: &str, body: &str, set_cookie: &str) -> Self {
        self.canned.insert(
            path.to_string(),
            Canned::Ok {
                body: body.to_string(),
                cookie: Some(set_cookie.to_string()),
            },
        );
        self
    }

    pub fn fail(mut self, path: &str, status: u16, message: &str) -> Self {
        self.canned.insert(
            path.to_string(),
            Canned::Status {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// Make every call take a while, so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call_with_headers(
        &self,
        method: Method,
        path: &str,
        _body: Option<&serde_json::Value>,
        headers: HeaderMap,
    ) -> Result<Response, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            headers,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.canned.get(path).cloned() {
            Some(Canned::Ok { body, cookie }) => {
                let mut headers = HeaderMap::new();
                if let Some(cookie) = cookie {
                    headers.insert(SET_COOKIE, HeaderValue::from_str(&cookie).unwrap());
                }
                Ok(Response {
                    status: StatusCode::OK,
                    headers,
                    body: Bytes::from(body),
                })
            }
            Some(Canned::Status { status, message }) => {
                Err(TransportError::Status { status, message })
            }
            None => Err(TransportError::Status {
                status: 404,
                message: format!("no canned response for {}", path),
            }),
        }
    }
}

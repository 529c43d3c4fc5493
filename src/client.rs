use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::{AuthManager, CredentialStore};
use crate::config::Config;
use crate::error::Result;
use crate::transport::{HttpTransport, Response, Transport, TransportError};

/// Health-check path hit by [`ApiClient::ping`]
pub const HEALTH_PATH: &str = "/healthz";

/// API client bound to one server and one credential
pub struct ApiClient {
    transport: Arc<HttpTransport>,

    /// Resolves and attaches credentials
    auth: AuthManager,
}

impl ApiClient {
    /// Create a client with the credential from `config`
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let auth = AuthManager::new(config.credential.clone(), transport.clone());

        Ok(Self { transport, auth })
    }

    /// The credential store; use it to switch credentials at runtime
    pub fn credentials(&self) -> &CredentialStore {
        self.auth.store()
    }

    /// Resolve the bearer token the next request would carry
    pub async fn token(&self) -> Result<String> {
        Ok(self.auth.resolve().await?.bearer)
    }

    /// Send an authenticated request and return the raw response
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let request = self.transport.build(method, path, body)?;

        // Last step before dispatch: an auth failure must not hit the network
        let request = self.auth.authenticate(request).await.map_err(|e| {
            tracing::warn!(path = %path, error = %e, "Request not sent: authentication failed");
            e
        })?;

        Ok(self.transport.execute(request).await?)
    }

    /// Send an authenticated request and decode the JSON response
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let response = self.send(method, path, body).await?;

        // 204 and friends decode as JSON null
        if response.body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)
                .map_err(TransportError::Decode)?);
        }

        Ok(response.json()?)
    }

    /// Unauthenticated health check
    pub async fn ping(&self) -> Result<StatusCode> {
        let response = self.transport.call(Method::GET, HEALTH_PATH, None).await?;
        Ok(response.status)
    }
}

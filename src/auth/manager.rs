use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Request;
use std::sync::Arc;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::jwt;
use super::refresh;
use super::types::{BuildRef, Credential, ResolvedCredential};
use crate::transport::Transport;

/// Secondary header carrying the SCM token in build mode
pub const SCM_TOKEN_HEADER: &str = "token";

/// Authentication manager
/// Resolves the credential for each outgoing request, refreshing on demand
pub struct AuthManager {
    /// Credentials owned by this client
    store: CredentialStore,

    /// Transport used for exchange and refresh round-trips
    transport: Arc<dyn Transport>,
}

impl AuthManager {
    pub fn new(credential: Credential, transport: Arc<dyn Transport>) -> Self {
        Self {
            store: CredentialStore::new(credential),
            transport,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Produce the token(s) for one outgoing request.
    ///
    /// Expired access and SCM tokens are refreshed inline and written back
    /// into the store. Nothing is retried: any failure here fails the request.
    pub async fn resolve(&self) -> Result<ResolvedCredential, AuthError> {
        let credential = self.store.snapshot().await;
        tracing::debug!("Resolving credential: {}", credential.mode());

        let resolved = match credential {
            Credential::None => return Err(AuthError::NoCredentialConfigured),

            // Expired or not, a static token is all we have
            Credential::StaticToken(token) => ResolvedCredential::bearer(token),

            Credential::PersonalAccessToken(pat) => ResolvedCredential::bearer(
                refresh::exchange_personal_access_token(self.transport.as_ref(), &pat).await?,
            ),

            Credential::AccessRefreshPair {
                access_token,
                refresh_token,
            } => {
                let token = if jwt::is_expired(&access_token) {
                    self.refresh_access(access_token, refresh_token).await?
                } else {
                    access_token
                };
                ResolvedCredential::bearer(token)
            }

            Credential::BuildAndScmPair {
                build_token,
                scm_token,
                build,
            } => self.resolve_build(build_token, scm_token, build).await?,
        };

        if resolved.bearer.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        Ok(resolved)
    }

    /// Refresh an expired access token. Only one refresh runs per store; later
    /// callers pick up the token the first one stored.
    async fn refresh_access(
        &self,
        mut access_token: String,
        mut refresh_token: String,
    ) -> Result<String, AuthError> {
        let _guard = self.store.refresh_lock().await;

        // Someone may have refreshed while we waited for the lock
        if let Credential::AccessRefreshPair {
            access_token: current_access,
            refresh_token: current_refresh,
        } = self.store.snapshot().await
        {
            if current_access != access_token || !jwt::is_expired(&current_access) {
                tracing::debug!("Access token already refreshed by a concurrent request");
                return Ok(current_access);
            }
            access_token = current_access;
            refresh_token = current_refresh;
        }

        if jwt::is_expired(&refresh_token) {
            tracing::warn!("Access and refresh tokens have both expired");
            return Err(AuthError::CredentialsExpired);
        }

        tracing::debug!(
            "Access token expired (was {:?}), refreshing",
            jwt::expires_at(&access_token)
        );

        let refreshed =
            refresh::refresh_access_token(self.transport.as_ref(), &refresh_token).await?;

        if !self
            .store
            .update_access_token(
                &access_token,
                &refresh_token,
                refreshed.access_token.clone(),
                refreshed.refresh_token.clone(),
            )
            .await
        {
            tracing::warn!("Credential changed during refresh, not storing the new access token");
        }

        Ok(refreshed.access_token)
    }

    async fn resolve_build(
        &self,
        build_token: String,
        scm_token: String,
        build: BuildRef,
    ) -> Result<ResolvedCredential, AuthError> {
        if scm_token.is_empty() {
            return Err(AuthError::MissingScmToken);
        }

        let scm_token = if jwt::is_expired(&scm_token) {
            self.refresh_scm(build_token.clone(), scm_token, build).await?
        } else {
            scm_token
        };

        Ok(ResolvedCredential {
            bearer: build_token,
            scm_token: Some(scm_token),
        })
    }

    async fn refresh_scm(
        &self,
        build_token: String,
        scm_token: String,
        build: BuildRef,
    ) -> Result<String, AuthError> {
        let _guard = self.store.refresh_lock().await;

        let (build_token, build) = match self.store.snapshot().await {
            Credential::BuildAndScmPair {
                build_token: current_build,
                scm_token: current_scm,
                build: current_ref,
            } => {
                if current_scm != scm_token && !current_scm.is_empty() {
                    tracing::debug!("SCM token already refreshed by a concurrent request");
                    return Ok(current_scm);
                }
                (current_build, current_ref)
            }
            _ => (build_token, build),
        };

        let refreshed =
            refresh::refresh_scm_token(self.transport.as_ref(), &build_token, &build).await?;

        if refreshed.is_empty() {
            return Err(AuthError::MissingScmToken);
        }

        if !self
            .store
            .update_scm_token(&build_token, &scm_token, refreshed.clone())
            .await
        {
            tracing::warn!("Credential changed during refresh, not storing the new SCM token");
        }

        Ok(refreshed)
    }

    /// Attach credentials to a fully built request.
    ///
    /// Must run last, after body, content type and user agent are set, so that
    /// an authentication failure stops the request before any I/O.
    pub async fn authenticate(&self, mut request: Request) -> Result<Request, AuthError> {
        let resolved = self.resolve().await?;

        let mut bearer = HeaderValue::try_from(format!("Bearer {}", resolved.bearer))?;
        bearer.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, bearer);

        if let Some(scm_token) = resolved.scm_token {
            let mut value = HeaderValue::try_from(scm_token)?;
            value.set_sensitive(true);
            request
                .headers_mut()
                .insert(HeaderName::from_static(SCM_TOKEN_HEADER), value);
        }

        Ok(request)
    }
}

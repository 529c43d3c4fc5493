// Token refresh logic
// Round-trips that mint short-lived tokens through the transport

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::Method;

use super::error::AuthError;
use super::types::{BuildRef, TokenResponse};
use crate::transport::Transport;

/// Endpoint exchanging a personal access token for a bearer token
pub const EXCHANGE_PATH: &str = "/api/v1/auth/token";

/// Endpoint minting a new access token from the refresh cookie
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Cookie carrying the refresh token, both ways
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Result of an access token refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,

    /// Set when the server rotated the refresh cookie
    pub refresh_token: Option<String>,
}

/// Path of the SCM install-token endpoint for a build
pub fn install_token_path(org: &str, repo: &str, build_number: u64) -> String {
    format!(
        "/api/v1/repos/{}/{}/builds/{}/install-token",
        org, repo, build_number
    )
}

fn sensitive(value: String) -> Result<HeaderValue, AuthError> {
    let mut value = HeaderValue::try_from(value)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Exchange a personal access token for a short-lived bearer token.
/// The PAT goes raw in the `Authorization` header.
pub async fn exchange_personal_access_token(
    transport: &dyn Transport,
    pat: &str,
) -> Result<String, AuthError> {
    if pat.is_empty() {
        return Err(AuthError::ExchangeFailed(
            "personal access token is empty".to_string(),
        ));
    }

    tracing::debug!("Exchanging personal access token...");

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, sensitive(pat.to_string())?);

    let response = transport
        .call_with_headers(Method::POST, EXCHANGE_PATH, None, headers)
        .await
        .map_err(|e| {
            tracing::error!("Personal access token exchange failed: {}", e);
            AuthError::ExchangeFailed(e.to_string())
        })?;

    let data: TokenResponse = response
        .json()
        .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

    if data.token.is_empty() {
        return Err(AuthError::ExchangeFailed(
            "response does not contain a token".to_string(),
        ));
    }

    Ok(data.token)
}

/// Mint a new access token. The refresh token travels as a cookie, and the
/// server may answer with a rotated one.
pub async fn refresh_access_token(
    transport: &dyn Transport,
    refresh_token: &str,
) -> Result<RefreshedTokens, AuthError> {
    tracing::info!("Refreshing access token...");

    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        sensitive(format!("{}={}", REFRESH_TOKEN_COOKIE, refresh_token))?,
    );

    let response = transport
        .call_with_headers(Method::POST, REFRESH_PATH, None, headers)
        .await
        .map_err(|e| {
            tracing::error!("Access token refresh failed: {}", e);
            e
        })?;

    let data: TokenResponse = response.json()?;
    if data.token.is_empty() {
        tracing::error!("Access token refresh returned an empty token");
        return Err(AuthError::EmptyToken);
    }
    let rotated = response.cookie(REFRESH_TOKEN_COOKIE);

    tracing::info!(
        rotated_refresh_token = rotated.is_some(),
        "Access token refreshed"
    );

    Ok(RefreshedTokens {
        access_token: data.token,
        refresh_token: rotated,
    })
}

/// Mint a fresh SCM token for a build, authenticated with the build token
pub async fn refresh_scm_token(
    transport: &dyn Transport,
    build_token: &str,
    build: &BuildRef,
) -> Result<String, AuthError> {
    let (org, repo) = build
        .org_and_repo()
        .ok_or_else(|| AuthError::InvalidBuildRepoRef(build.repo.clone()))?;

    tracing::info!("Refreshing SCM token for {}/{} #{}...", org, repo, build.number);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, sensitive(format!("Bearer {}", build_token))?);

    let response = transport
        .call_with_headers(
            Method::POST,
            &install_token_path(org, repo, build.number),
            None,
            headers,
        )
        .await
        .map_err(|e| {
            tracing::error!("SCM token refresh failed: {}", e);
            e
        })?;

    let data: TokenResponse = response.json()?;
    Ok(data.token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::MockTransport;

    #[test]
    fn test_install_token_path() {
        assert_eq!(
            install_token_path("acme", "widgets", 42),
            "/api/v1/repos/acme/widgets/builds/42/install-token"
        );
    }

    #[tokio::test]
    async fn test_exchange_sends_raw_pat() {
        let transport = MockTransport::new().respond(EXCHANGE_PATH, r#"{"token":"short"}"#);
        let token = exchange_personal_access_token(&transport, "pat-123")
            .await
            .unwrap();
        assert_eq!(token, "short");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].headers[AUTHORIZATION], "pat-123");
    }

    #[tokio::test]
    async fn test_exchange_rejects_empty_pat() {
        let transport = MockTransport::new();
        let result = exchange_personal_access_token(&transport, "").await;
        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_wraps_transport_failure() {
        let transport = MockTransport::new().fail(EXCHANGE_PATH, 401, "bad pat");
        let result = exchange_personal_access_token(&transport, "pat").await;
        match result {
            Err(AuthError::ExchangeFailed(msg)) => assert!(msg.contains("bad pat")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_requires_token_in_body() {
        let transport = MockTransport::new().respond(EXCHANGE_PATH, "{}");
        let result = exchange_personal_access_token(&transport, "pat").await;
        assert!(matches!(result, Err(AuthError::ExchangeFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_sends_cookie() {
        let transport = MockTransport::new().respond(REFRESH_PATH, r#"{"token":"new-access"}"#);
        let refreshed = refresh_access_token(&transport, "refresh-abc").await.unwrap();
        assert_eq!(
            refreshed,
            RefreshedTokens {
                access_token: "new-access".into(),
                refresh_token: None,
            }
        );
        assert_eq!(
            transport.calls()[0].headers[COOKIE],
            "refresh_token=refresh-abc"
        );
    }

    #[tokio::test]
    async fn test_refresh_reads_rotated_cookie() {
        let transport = MockTransport::new().respond_with_cookie(
            REFRESH_PATH,
            r#"{"token":"new-access"}"#,
            "refresh_token=rotated; HttpOnly",
        );
        let refreshed = refresh_access_token(&transport, "refresh-abc").await.unwrap();
        assert_eq!(refreshed.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_refresh_rejects_empty_token() {
        let transport = MockTransport::new().respond_with_cookie(
            REFRESH_PATH,
            r#"{"token":""}"#,
            "refresh_token=rotated; HttpOnly",
        );
        let result = refresh_access_token(&transport, "refresh-abc").await;
        assert!(matches!(result, Err(AuthError::EmptyToken)));
    }

    #[tokio::test]
    async fn test_scm_refresh_uses_build_token() {
        let path = install_token_path("acme", "widgets", 5);
        let transport = MockTransport::new().respond(&path, r#"{"token":"scm-new"}"#);
        let token = refresh_scm_token(&transport, "build-tok", &BuildRef::new("acme/widgets", 5))
            .await
            .unwrap();
        assert_eq!(token, "scm-new");
        assert_eq!(transport.calls()[0].path, path);
        assert_eq!(
            transport.calls()[0].headers[AUTHORIZATION],
            "Bearer build-tok"
        );
    }

    #[tokio::test]
    async fn test_scm_refresh_rejects_bad_repo() {
        let transport = MockTransport::new();
        let result = refresh_scm_token(&transport, "build", &BuildRef::new("org", 1)).await;
        assert!(matches!(result, Err(AuthError::InvalidBuildRepoRef(r)) if r == "org"));
        assert!(transport.calls().is_empty());
    }
}

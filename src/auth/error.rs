use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

use crate::transport::TransportError;

/// Why a request could not be authenticated. None of these are retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No credential configured")]
    NoCredentialConfigured,

    /// Access and refresh tokens are both expired
    #[error("Tokens have expired, re-authenticate")]
    CredentialsExpired,

    #[error("Personal access token exchange failed: {0}")]
    ExchangeFailed(String),

    /// A refresh round-trip failed
    #[error("Token refresh failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Build credentials have no SCM token")]
    MissingScmToken,

    #[error("Invalid build repository reference: {0:?} (expected org/repo)")]
    InvalidBuildRepoRef(String),

    /// The server refreshed to an empty access token, or the resolver
    /// produced one
    #[error("Resolved an empty token")]
    EmptyToken,

    #[error("Token is not a valid header value")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AuthError::CredentialsExpired.to_string(),
            "Tokens have expired, re-authenticate"
        );
        assert_eq!(
            AuthError::InvalidBuildRepoRef("org".to_string()).to_string(),
            "Invalid build repository reference: \"org\" (expected org/repo)"
        );

        let err = AuthError::from(TransportError::Status {
            status: 401,
            message: "bad cookie".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Token refresh failed: Server returned 401: bad cookie"
        );
    }
}

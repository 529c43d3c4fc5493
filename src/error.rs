// Error handling module
// Errors surfaced by ApiClient calls

use thiserror::Error;

use crate::auth::AuthError;
use crate::transport::TransportError;

/// Errors that can occur while issuing an API call
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request could not be authenticated; nothing was sent
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The request was sent and failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    /// HTTP status, when the server answered with an error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport(TransportError::Status { status, .. })
            | ClientError::Auth(AuthError::Transport(TransportError::Status { status, .. })) => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ClientError>;

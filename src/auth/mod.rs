// Authentication module
// Credential storage, token expiry checks, refresh and request signing

mod credentials;
mod error;
pub mod jwt;
mod manager;
pub mod refresh;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::CredentialStore;
pub use error::AuthError;
pub use manager::{AuthManager, SCM_TOKEN_HEADER};
pub use types::{BuildRef, Credential, CredentialMode, ResolvedCredential};

// CI server API client - library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use auth::{AuthError, BuildRef, Credential, CredentialMode, CredentialStore};
pub use client::ApiClient;
pub use config::Config;
pub use error::ClientError;

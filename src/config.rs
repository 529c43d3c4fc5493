use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::auth::{BuildRef, Credential, CredentialMode};

/// Command-line client for the CI server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server URL
    #[arg(short, long, env = "CI_SERVER")]
    pub server: String,

    /// Static bearer token
    #[arg(short, long, env = "CI_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Personal access token, exchanged for a short-lived token per request
    #[arg(long, env = "CI_PAT", hide_env_values = true)]
    pub pat: Option<String>,

    /// Access token (needs --refresh-token)
    #[arg(long, env = "CI_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Refresh token (needs --access-token)
    #[arg(long, env = "CI_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Build token (needs --scm-token)
    #[arg(long, env = "CI_BUILD_TOKEN", hide_env_values = true)]
    pub build_token: Option<String>,

    /// SCM token (needs --build-token)
    #[arg(long, env = "CI_SCM_TOKEN", hide_env_values = true)]
    pub scm_token: Option<String>,

    /// Repository of the running build, as org/repo
    #[arg(long, env = "CI_BUILD_REPO")]
    pub build_repo: Option<String>,

    /// Number of the running build
    #[arg(long, env = "CI_BUILD_NUMBER")]
    pub build_number: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Resolve and print the bearer token
    Token,

    /// Authenticated GET, prints the JSON response
    Get {
        /// API path, e.g. /api/v1/user
        path: String,
    },

    /// Check that the server is reachable (unauthenticated)
    Ping,
}

impl CliArgs {
    /// Parse arguments, with a `.env` file (if any) feeding the env fallbacks
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_url: String,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub user_agent: String,

    pub log_level: String,

    /// Initial credential of the client
    pub credential: Credential,
}

impl Config {
    /// Defaults for library use; no credential
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            http_connect_timeout: 10,
            http_request_timeout: 60,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            log_level: "info".to_string(),
            credential: Credential::None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Build configuration from parsed arguments (CLI > ENV > defaults)
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = Config::new(args.server.clone());

        config.http_connect_timeout = std::env::var("HTTP_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.http_connect_timeout);
        config.http_request_timeout = args.http_timeout;
        config.log_level = args.log_level.clone();
        config.credential = credential_from_args(args)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.server_url)
            .with_context(|| format!("CI_SERVER is not a valid URL: {}", self.server_url))?;

        if !matches!(url.scheme(), "http" | "https") {
            bail!("CI_SERVER must be an http(s) URL: {}", self.server_url);
        }

        Ok(())
    }
}

/// Pick the one credential the arguments describe
fn credential_from_args(args: &CliArgs) -> Result<Credential> {
    let mut found = Vec::new();

    if let Some(token) = &args.token {
        found.push(Credential::StaticToken(token.clone()));
    }

    if let Some(pat) = &args.pat {
        found.push(Credential::PersonalAccessToken(pat.clone()));
    }

    match (&args.access_token, &args.refresh_token) {
        (Some(access), Some(refresh)) => found.push(Credential::AccessRefreshPair {
            access_token: access.clone(),
            refresh_token: refresh.clone(),
        }),
        (None, None) => {}
        _ => bail!("--access-token and --refresh-token must be given together"),
    }

    match (&args.build_token, &args.scm_token) {
        (Some(build_token), Some(scm_token)) => found.push(Credential::BuildAndScmPair {
            build_token: build_token.clone(),
            scm_token: scm_token.clone(),
            build: BuildRef::new(
                args.build_repo.clone().unwrap_or_default(),
                args.build_number.unwrap_or_default(),
            ),
        }),
        (None, None) => {}
        _ => bail!("--build-token and --scm-token must be given together"),
    }

    if found.len() > 1 {
        let modes: Vec<String> = found.iter().map(|c| c.mode().to_string()).collect();
        bail!(
            "Only one credential may be configured, found: {}",
            modes.join(", ")
        );
    }

    let credential = found.pop().unwrap_or_default();
    if credential.mode() == CredentialMode::None {
        tracing::debug!("No credential configured");
    }
    Ok(credential)
}

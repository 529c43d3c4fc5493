// Authentication types

use serde::Deserialize;
use std::fmt;

/// Which kind of credential is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    None,
    StaticToken,
    PersonalAccessToken,
    AccessRefreshPair,
    BuildAndScmPair,
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialMode::None => "none",
            CredentialMode::StaticToken => "static token",
            CredentialMode::PersonalAccessToken => "personal access token",
            CredentialMode::AccessRefreshPair => "access/refresh pair",
            CredentialMode::BuildAndScmPair => "build/SCM pair",
        };
        f.write_str(name)
    }
}

/// The build a build token belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRef {
    /// `org/repo`
    pub repo: String,
    pub number: u64,
}

impl BuildRef {
    pub fn new(repo: impl Into<String>, number: u64) -> Self {
        Self {
            repo: repo.into(),
            number,
        }
    }

    /// Split `repo` into `(org, repo)`; both parts must be non-empty
    pub fn org_and_repo(&self) -> Option<(&str, &str)> {
        let mut parts = self.repo.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(repo), None) if !org.is_empty() && !repo.is_empty() => {
                Some((org, repo))
            }
            _ => None,
        }
    }
}

/// Complete credential set. Only the active variant's secrets exist.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    #[default]
    None,

    /// Fixed bearer token, used as-is
    StaticToken(String),

    /// Long-lived token exchanged for a short-lived bearer on every request
    PersonalAccessToken(String),

    /// Short-lived access token plus the refresh token that mints new ones
    AccessRefreshPair {
        access_token: String,
        refresh_token: String,
    },

    /// Build-scoped bearer token plus the SCM provider token used by a build
    BuildAndScmPair {
        build_token: String,
        scm_token: String,
        build: BuildRef,
    },
}

impl Credential {
    pub fn mode(&self) -> CredentialMode {
        match self {
            Credential::None => CredentialMode::None,
            Credential::StaticToken(_) => CredentialMode::StaticToken,
            Credential::PersonalAccessToken(_) => CredentialMode::PersonalAccessToken,
            Credential::AccessRefreshPair { .. } => CredentialMode::AccessRefreshPair,
            Credential::BuildAndScmPair { .. } => CredentialMode::BuildAndScmPair,
        }
    }
}

// Secrets stay out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::BuildAndScmPair { build, .. } => f
                .debug_struct("BuildAndScmPair")
                .field("build", build)
                .finish_non_exhaustive(),
            other => write!(f, "Credential({})", other.mode()),
        }
    }
}

/// What the resolver hands to the authenticator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    /// Goes into `Authorization: Bearer ...`
    pub bearer: String,

    /// Goes into the `Token` header (build/SCM mode only)
    pub scm_token: Option<String>,
}

impl ResolvedCredential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: token.into(),
            scm_token: None,
        }
    }
}

/// Body of every token-minting endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_and_repo() {
        assert_eq!(
            BuildRef::new("acme/widgets", 7).org_and_repo(),
            Some(("acme", "widgets"))
        );
        assert_eq!(BuildRef::new("acme", 7).org_and_repo(), None);
        assert_eq!(BuildRef::new("acme/", 7).org_and_repo(), None);
        assert_eq!(BuildRef::new("/widgets", 7).org_and_repo(), None);
        assert_eq!(BuildRef::new("a/b/c", 7).org_and_repo(), None);
        assert_eq!(BuildRef::default().org_and_repo(), None);
    }

    #[test]
    fn test_mode() {
        assert_eq!(Credential::default().mode(), CredentialMode::None);
        assert_eq!(
            Credential::StaticToken("t".into()).mode(),
            CredentialMode::StaticToken
        );
        assert_eq!(
            Credential::AccessRefreshPair {
                access_token: "a".into(),
                refresh_token: "r".into(),
            }
            .mode(),
            CredentialMode::AccessRefreshPair
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let cred = Credential::PersonalAccessToken("super-secret".into());
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("personal access token"));

        let cred = Credential::BuildAndScmPair {
            build_token: "build-secret".into(),
            scm_token: "scm-secret".into(),
            build: BuildRef::new("acme/widgets", 3),
        };
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("acme/widgets"));
    }

    #[test]
    fn test_token_response_defaults_to_empty() {
        let parsed: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.token.is_empty());
    }
}

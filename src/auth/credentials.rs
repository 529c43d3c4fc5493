// Credential store
// Holds the active credential and serializes refresh write-backs

use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::jwt;
use super::types::{BuildRef, Credential, CredentialMode};

/// The credential of one API client.
///
/// Every setter replaces the whole credential, so switching modes drops the
/// previous secrets. Reads take a snapshot; refreshes hold [`Self::refresh_lock`]
/// for the whole read-refresh-write sequence.
#[derive(Debug, Default)]
pub struct CredentialStore {
    /// Current credentials
    credential: RwLock<Credential>,

    /// Held while a refresh round-trip is in flight
    refresh: Mutex<()>,
}

impl CredentialStore {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(credential),
            refresh: Mutex::new(()),
        }
    }

    async fn replace(&self, credential: Credential) {
        let mode = credential.mode();
        *self.credential.write().await = credential;
        tracing::debug!("Credential mode set to {}", mode);
    }

    pub async fn set_static_token(&self, token: impl Into<String>) {
        self.replace(Credential::StaticToken(token.into())).await;
    }

    pub async fn set_personal_access_token(&self, token: impl Into<String>) {
        self.replace(Credential::PersonalAccessToken(token.into()))
            .await;
    }

    pub async fn set_access_refresh_pair(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) {
        self.replace(Credential::AccessRefreshPair {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        })
        .await;
    }

    /// Switch to build credentials. The build reference starts empty; see
    /// [`Self::set_build_ref`].
    pub async fn set_build_and_scm_pair(
        &self,
        build_token: impl Into<String>,
        scm_token: impl Into<String>,
    ) {
        self.replace(Credential::BuildAndScmPair {
            build_token: build_token.into(),
            scm_token: scm_token.into(),
            build: BuildRef::default(),
        })
        .await;
    }

    /// Record which build the build token belongs to.
    /// Ignored unless build credentials are active.
    pub async fn set_build_ref(&self, repo: impl Into<String>, number: u64) {
        let mut credential = self.credential.write().await;
        match &mut *credential {
            Credential::BuildAndScmPair { build, .. } => *build = BuildRef::new(repo, number),
            other => tracing::warn!(
                "Ignoring build reference: active credential is {}",
                other.mode()
            ),
        }
    }

    pub async fn clear(&self) {
        self.replace(Credential::None).await;
    }

    pub async fn mode(&self) -> CredentialMode {
        self.credential.read().await.mode()
    }

    pub async fn has_credential(&self) -> bool {
        self.mode().await != CredentialMode::None
    }

    pub async fn is_static_token(&self) -> bool {
        self.mode().await == CredentialMode::StaticToken
    }

    pub async fn is_personal_access_token(&self) -> bool {
        self.mode().await == CredentialMode::PersonalAccessToken
    }

    pub async fn is_access_refresh_pair(&self) -> bool {
        self.mode().await == CredentialMode::AccessRefreshPair
    }

    pub async fn is_build_and_scm_pair(&self) -> bool {
        self.mode().await == CredentialMode::BuildAndScmPair
    }

    /// Pre-flight check: true when the credential cannot produce a usable
    /// token without re-authenticating
    pub async fn is_expired(&self) -> bool {
        match &*self.credential.read().await {
            Credential::None => true,
            Credential::StaticToken(token) => jwt::is_expired(token),
            Credential::PersonalAccessToken(_) => false,
            Credential::AccessRefreshPair {
                access_token,
                refresh_token,
            } => jwt::is_expired(access_token) && jwt::is_expired(refresh_token),
            Credential::BuildAndScmPair { build_token, .. } => jwt::is_expired(build_token),
        }
    }

    /// Copy of the current credential
    pub(crate) async fn snapshot(&self) -> Credential {
        self.credential.read().await.clone()
    }

    /// Serialize refreshes; hold the guard until the new token is stored
    pub(crate) async fn refresh_lock(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }

    /// Store a refreshed access token, and the rotated refresh token if the
    /// server sent one. `stale_access` and `used_refresh` are the tokens the
    /// refresh was based on; if either no longer matches the store (a setter
    /// ran meanwhile) nothing is written and false is returned.
    pub(crate) async fn update_access_token(
        &self,
        stale_access: &str,
        used_refresh: &str,
        new_access_token: String,
        new_refresh_token: Option<String>,
    ) -> bool {
        let mut credential = self.credential.write().await;
        let Credential::AccessRefreshPair {
            access_token,
            refresh_token,
        } = &mut *credential
        else {
            return false;
        };

        if access_token.as_str() != stale_access || refresh_token.as_str() != used_refresh {
            return false;
        }

        *access_token = new_access_token;
        if let Some(rotated) = new_refresh_token {
            *refresh_token = rotated;
        }
        true
    }

    /// Store a refreshed SCM token, unless the build credentials were replaced
    /// since `stale_scm` was read. Returns whether the store was updated.
    pub(crate) async fn update_scm_token(
        &self,
        used_build: &str,
        stale_scm: &str,
        new_scm_token: String,
    ) -> bool {
        let mut credential = self.credential.write().await;
        let Credential::BuildAndScmPair {
            build_token,
            scm_token,
            ..
        } = &mut *credential
        else {
            return false;
        };

        if build_token.as_str() != used_build || scm_token.as_str() != stale_scm {
            return false;
        }

        *scm_token = new_scm_token;
        true
    }
}

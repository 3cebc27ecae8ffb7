//! Credential Manager
//!
//! Owns one tool instance's OAuth credential: loads it from the credential
//! store, runs the interactive consent flow, refreshes expired access tokens
//! on demand, and re-persists every change. Gmail and Calendar each get their
//! own manager, configured with their own scopes and store path.
//!
//! The in-memory slot sits behind a mutex that is held across a refresh, so
//! concurrent operations never refresh twice or observe a half-refreshed
//! credential.

pub mod app_credentials;
pub mod credential;
pub mod flow;
pub mod provider;
pub mod store;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use self::app_credentials::{load_app_credentials, AppCredentialsError};
use self::credential::{Credential, CredentialState};
use self::flow::{BrowserLauncher, ConsentFlow};
use self::provider::{OAuthClient, OAuthProvider, ProviderError};
use self::store::CredentialStore;
use crate::clock::Clock;
use crate::common::{ErrorCode, OperationResult};

/// Default bound on the interactive consent flow.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Human-readable service name used in messages ("Gmail", "Google Calendar").
    pub service: String,
    pub scopes: Vec<String>,
    pub token_path: PathBuf,
    pub app_credentials_path: PathBuf,
    pub auth_timeout: Duration,
}

/// Diagnostic view of the credential slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub valid: bool,
    pub expired: bool,
    pub has_refresh_token: bool,
    pub message: String,
}

#[derive(Debug, Error)]
enum RefreshError {
    #[error(transparent)]
    Client(#[from] AppCredentialsError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct CredentialManager {
    config: ManagerConfig,
    store: CredentialStore,
    slot: Mutex<Option<Credential>>,
    auth_flow: Mutex<()>,
    provider: Arc<dyn OAuthProvider>,
    launcher: Arc<dyn BrowserLauncher>,
    clock: Arc<dyn Clock>,
}

impl CredentialManager {
    pub fn new(
        config: ManagerConfig,
        provider: Arc<dyn OAuthProvider>,
        launcher: Arc<dyn BrowserLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = CredentialStore::new(config.token_path.clone());
        Self {
            config,
            store,
            slot: Mutex::new(None),
            auth_flow: Mutex::new(()),
            provider,
            launcher,
            clock,
        }
    }

    pub fn service(&self) -> &str {
        &self.config.service
    }

    pub fn scopes(&self) -> &[String] {
        &self.config.scopes
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Populate the slot from the credential store. A missing or unreadable
    /// store leaves the manager without a credential; that is the normal
    /// first-run state.
    pub async fn load(&self) {
        let loaded = match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!("{}: ignoring unreadable credential store: {}", self.service(), e);
                None
            }
        };

        match &loaded {
            Some(credential) => info!(
                "{}: loaded credential ({} scopes)",
                self.service(),
                credential.scopes.len()
            ),
            None => info!("{}: no stored credential", self.service()),
        }

        *self.slot.lock().await = loaded;
    }

    /// Run the interactive consent flow with the configured timeout.
    pub async fn authenticate(&self) -> OperationResult<()> {
        self.authenticate_with_cancel(CancellationToken::new()).await
    }

    /// Run the interactive consent flow, giving up when `cancel` fires.
    ///
    /// On success the new credential replaces whatever was held before and is
    /// written to the store.
    pub async fn authenticate_with_cancel(&self, cancel: CancellationToken) -> OperationResult<()> {
        let Ok(_flow_guard) = self.auth_flow.try_lock() else {
            warn!("{}: authentication already in progress", self.service());
            return OperationResult::failure(
                ErrorCode::AuthFlowFailed,
                format!("Authentication with {} is already in progress", self.service()),
            );
        };

        info!("{}: starting OAuth consent flow", self.service());

        let client = match load_app_credentials(&self.config.app_credentials_path) {
            Ok(client) => client,
            Err(e) => {
                error!("{}: {}", self.service(), e);
                return auth_failed(e);
            }
        };

        let flow = ConsentFlow {
            provider: self.provider.as_ref(),
            launcher: self.launcher.as_ref(),
            client: &client,
            scopes: &self.config.scopes,
            timeout: self.config.auth_timeout,
        };
        let tokens = match flow.run(&cancel).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("{}: OAuth flow failed: {}", self.service(), e);
                return auth_failed(e);
            }
        };

        // A refresh in flight holds the slot and writes the store; wait for it
        // so the new grant is the last record written.
        let mut slot = self.slot.lock().await;
        let credential =
            Credential::from_tokens(tokens, &client, &self.config.scopes, self.clock.now());
        let saved = self.store.save(&credential);
        *slot = Some(credential);
        drop(slot);

        if let Err(e) = saved {
            error!("{}: failed to persist credential: {}", self.service(), e);
            return auth_failed(e);
        }

        info!("{}: authentication complete", self.service());
        OperationResult::success(
            format!("Successfully authenticated with {}", self.service()),
            (),
        )
    }

    /// Whether a usable credential is available right now, refreshing an
    /// expired one when a refresh token allows it.
    pub async fn ensure_valid(&self) -> bool {
        self.access_token().await.is_some()
    }

    /// The currently valid access token, with the same refresh-on-demand
    /// behaviour as [`ensure_valid`](Self::ensure_valid).
    pub async fn access_token(&self) -> Option<String> {
        let mut slot = self.slot.lock().await;
        if self.validate_locked(&mut slot).await {
            slot.as_ref().map(|c| c.access_token.clone())
        } else {
            None
        }
    }

    /// Diagnostic status. Like `ensure_valid`, this may refresh the token.
    pub async fn get_status(&self) -> AuthStatus {
        let mut slot = self.slot.lock().await;

        let Some(has_refresh_token) = slot.as_ref().map(Credential::has_refresh_token) else {
            return AuthStatus {
                authenticated: false,
                valid: false,
                expired: false,
                has_refresh_token: false,
                message: "No credentials found. Please authenticate first.".to_string(),
            };
        };

        let valid = self.validate_locked(&mut slot).await;
        let now = self.clock.now();
        let expired = slot.as_ref().is_some_and(|c| c.is_expired_at(now));

        AuthStatus {
            authenticated: true,
            valid,
            expired,
            has_refresh_token,
            message: if valid {
                format!("Ready to access {}", self.service())
            } else {
                "Authentication required".to_string()
            },
        }
    }

    // ── Internal ────────────────────────────────────────────────────────────

    async fn validate_locked(&self, slot: &mut Option<Credential>) -> bool {
        let Some(credential) = slot.as_mut() else {
            return false;
        };

        match credential.state_at(self.clock.now()) {
            CredentialState::Valid => true,
            CredentialState::ExpiredUnrefreshable => {
                debug!("{}: credential expired with no refresh token", self.service());
                false
            }
            CredentialState::ExpiredRefreshable => match self.refresh(credential).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}: token refresh failed: {}", self.service(), e);
                    false
                }
            },
        }
    }

    /// Refresh `credential` in place. On failure it is left untouched.
    async fn refresh(&self, credential: &mut Credential) -> Result<(), RefreshError> {
        let client = self.refresh_client(credential)?;
        let refresh_token = credential.refresh_token.clone().unwrap_or_default();

        let tokens = self.provider.refresh_token(&client, &refresh_token).await?;

        let mut refreshed = credential.clone();
        refreshed.apply_refresh(tokens, self.clock.now());
        if let Err(e) = self.store.save(&refreshed) {
            warn!(
                "{}: refreshed token could not be persisted: {}",
                self.service(),
                e
            );
        }
        *credential = refreshed;

        info!("{}: access token refreshed", self.service());
        Ok(())
    }

    /// Client identity for a refresh: the one recorded with the credential,
    /// else the app credentials file.
    fn refresh_client(&self, credential: &Credential) -> Result<OAuthClient, AppCredentialsError> {
        match credential.oauth_client() {
            Some(client) => Ok(client),
            None => load_app_credentials(&self.config.app_credentials_path),
        }
    }
}

fn auth_failed(e: impl std::fmt::Display) -> OperationResult<()> {
    OperationResult::failure(
        ErrorCode::AuthFlowFailed,
        format!("Authentication failed: {}", e),
    )
}

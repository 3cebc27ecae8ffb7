//! Credential
//!
//! One user's OAuth grant for one scope set, in the form persisted by the
//! credential store. Files written by Google's own client libraries
//! (`authorized_user` JSON, which names the access token `token`) load as-is.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::provider::{OAuthClient, OAuthTokens, GOOGLE_AUTH_ENDPOINT, GOOGLE_TOKEN_ENDPOINT};

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    #[zeroize(skip)]
    pub token_type: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    #[zeroize(skip)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub token_uri: Option<String>,
}

// Custom Debug implementation that redacts sensitive fields
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("scopes", &self.scopes)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Usability of a present credential at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Valid,
    ExpiredRefreshable,
    ExpiredUnrefreshable,
}

impl Credential {
    /// Build a credential from a fresh code exchange.
    ///
    /// When the provider does not echo the granted scopes, the requested ones
    /// are recorded.
    pub fn from_tokens(
        tokens: OAuthTokens,
        client: &OAuthClient,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let scopes = if tokens.scopes.is_empty() {
            requested_scopes.to_vec()
        } else {
            tokens.scopes
        };
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.filter(|t| !t.is_empty()),
            token_type: tokens.token_type,
            expiry: tokens.expires_in.map(|secs| now + Duration::seconds(secs)),
            scopes,
            client_id: Some(client.client_id.clone()),
            client_secret: Some(client.client_secret.clone()),
            token_uri: Some(client.token_uri.clone()),
        }
    }

    /// A credential is expired from its expiry instant onwards. One with no
    /// recorded expiry never expires locally; the API decides.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if !self.is_expired_at(now) {
            CredentialState::Valid
        } else if self.has_refresh_token() {
            CredentialState::ExpiredRefreshable
        } else {
            CredentialState::ExpiredUnrefreshable
        }
    }

    /// OAuth client recorded alongside the token, if any.
    pub fn oauth_client(&self) -> Option<OAuthClient> {
        let client_id = self.client_id.clone().filter(|id| !id.is_empty())?;
        Some(OAuthClient {
            client_id,
            client_secret: self.client_secret.clone().unwrap_or_default(),
            auth_uri: GOOGLE_AUTH_ENDPOINT.to_string(),
            token_uri: self
                .token_uri
                .clone()
                .unwrap_or_else(|| GOOGLE_TOKEN_ENDPOINT.to_string()),
        })
    }

    /// Apply a refresh response: access token and expiry are replaced, the
    /// refresh token is kept unless the provider rotated it.
    pub fn apply_refresh(&mut self, tokens: OAuthTokens, now: DateTime<Utc>) {
        self.access_token = tokens.access_token;
        if let Some(rotated) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(rotated);
        }
        self.token_type = tokens.token_type;
        self.expiry = tokens.expires_in.map(|secs| now + Duration::seconds(secs));
        if !tokens.scopes.is_empty() {
            self.scopes = tokens.scopes;
        }
    }
}

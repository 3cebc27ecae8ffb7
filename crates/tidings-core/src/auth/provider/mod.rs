//! OAuth Provider Abstraction
//!
//! The token endpoint side of OAuth2: building the consent URL, exchanging an
//! authorization code, and refreshing an access token.

pub mod google;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Registered OAuth client application (from the client-secret descriptor).
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Tokens returned from an OAuth token exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Lifetime in seconds, relative to when the response was received.
    pub expires_in: Option<i64>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The token endpoint answered with an OAuth error (e.g. `invalid_grant`).
    #[error("{error}: {description}")]
    Rejected { error: String, description: String },
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name (e.g. "google")
    fn name(&self) -> &str;

    /// Build the authorization URL for the PKCE flow.
    fn authorize_url(
        &self,
        client: &OAuthClient,
        scopes: &[String],
        state: &str,
        code_challenge: &str,
        redirect_uri: &str,
    ) -> String {
        let scope_str = scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}\
             &code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            client.auth_uri,
            urlencoding::encode(&client.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_str),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        client: &OAuthClient,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, ProviderError>;

    /// Refresh an access token using a refresh token.
    async fn refresh_token(
        &self,
        client: &OAuthClient,
        refresh_token: &str,
    ) -> Result<OAuthTokens, ProviderError>;
}

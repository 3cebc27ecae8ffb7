//! Google OAuth2 Provider
//!
//! PKCE Authorization Code flow against the token endpoint named in the
//! client-secret descriptor.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};

use super::{OAuthClient, OAuthProvider, OAuthTokens, ProviderError};
use crate::common::create_http_client;

/// Google OAuth2 provider.
pub struct GoogleProvider {
    http: Client,
}

impl GoogleProvider {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self {
            http: create_http_client(30)?,
        })
    }

    /// POST a form-encoded request and return the parsed token response.
    ///
    /// Secrets travel in the request body only.
    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<OAuthTokens, ProviderError> {
        let response = self
            .http
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            error!("Token endpoint returned HTTP {}", status);
        }

        parse_token_response(&body).map_err(|e| match e {
            ProviderError::InvalidResponse(msg) if !status.is_success() => ProviderError::Rejected {
                error: format!("http_{}", status.as_u16()),
                description: msg,
            },
            other => other,
        })
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn exchange_code(
        &self,
        client: &OAuthClient,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        self.post_form(&client.token_uri, &params).await
    }

    async fn refresh_token(
        &self,
        client: &OAuthClient,
        refresh_token: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        info!("Refreshing access token");

        let params = [
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.post_form(&client.token_uri, &params).await
    }
}

/// Parse a Google OAuth2 token response.
fn parse_token_response(body: &str) -> Result<OAuthTokens, ProviderError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Invalid JSON response: {}", e)))?;

    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        let description = parsed
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error");
        return Err(ProviderError::Rejected {
            error: err.to_string(),
            description: description.to_string(),
        });
    }

    let access_token = parsed
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::InvalidResponse("Missing access_token in response".into()))?
        .to_string();

    let refresh_token = parsed
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .map(String::from);

    let token_type = parsed
        .get("token_type")
        .and_then(|v| v.as_str())
        .unwrap_or("Bearer")
        .to_string();

    let expires_in = parsed
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .or(Some(3600));

    let scopes = parsed
        .get("scope")
        .and_then(|v| v.as_str())
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    Ok(OAuthTokens {
        access_token,
        refresh_token,
        token_type,
        expires_in,
        scopes,
    })
}

// ── PKCE Utilities ──────────────────────────────────────────────────────────

/// Generate a PKCE code verifier (43-128 characters of unreserved URI characters).
pub fn generate_code_verifier() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

/// Derive the PKCE code challenge from a code verifier using S256.
pub fn generate_code_challenge(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(verifier.as_bytes());
    base64_url_encode(&hash)
}

/// Generate a random state string for CSRF protection
pub fn generate_state() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::rngs::OsRng.gen();
    hex::encode(bytes)
}

/// Base64url encoding (no padding) per RFC 4648 §5.
fn base64_url_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(data)
}

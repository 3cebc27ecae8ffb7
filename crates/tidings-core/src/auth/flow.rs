//! Interactive consent flow
//!
//! Opens a loopback listener, sends the user to the consent page, and waits
//! for the redirect carrying the authorization code. The wait is bounded by a
//! timeout and can be cancelled.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::google::{generate_code_challenge, generate_code_verifier, generate_state};
use super::provider::{OAuthClient, OAuthProvider, OAuthTokens, ProviderError};

/// Hands the consent URL to the user.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<(), String>;
}

/// Opens the system default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> Result<(), String> {
        open::that(url).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Failed to bind local callback server: {0}")]
    Bind(#[source] std::io::Error),
    #[error("OAuth flow timed out after {0} seconds")]
    Timeout(u64),
    #[error("OAuth flow was cancelled")]
    Cancelled,
    #[error("Invalid state parameter in OAuth callback")]
    StateMismatch,
    #[error("Authorization denied: {error} - {description}")]
    Denied { error: String, description: String },
    #[error("Callback server error: {0}")]
    Callback(#[source] std::io::Error),
    #[error("Token exchange failed: {0}")]
    Exchange(#[source] ProviderError),
}

pub struct ConsentFlow<'a> {
    pub provider: &'a dyn OAuthProvider,
    pub launcher: &'a dyn BrowserLauncher,
    pub client: &'a OAuthClient,
    pub scopes: &'a [String],
    pub timeout: Duration,
}

impl ConsentFlow<'_> {
    /// Run the flow to completion and return the exchanged tokens.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<OAuthTokens, FlowError> {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(FlowError::Bind)?;
        let port = listener.local_addr().map_err(FlowError::Bind)?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);
        info!("OAuth callback server listening on {}", redirect_uri);

        let auth_url = self.provider.authorize_url(
            self.client,
            self.scopes,
            &state,
            &code_challenge,
            &redirect_uri,
        );

        info!("Opening browser for {} OAuth authorization", self.provider.name());
        if let Err(e) = self.launcher.launch(&auth_url) {
            warn!(
                "Failed to open browser automatically: {}. Please visit: {}",
                e, auth_url
            );
        }

        let code = tokio::select! {
            _ = cancel.cancelled() => return Err(FlowError::Cancelled),
            res = tokio::time::timeout(self.timeout, wait_for_callback(&listener, &state)) => {
                res.map_err(|_| FlowError::Timeout(self.timeout.as_secs()))??
            }
        };

        self.provider
            .exchange_code(self.client, &code, &code_verifier, &redirect_uri)
            .await
            .map_err(FlowError::Exchange)
    }
}

/// Accept connections until one carries either an authorization code or an
/// error. Unrelated requests (a favicon fetch, say) get a 404.
async fn wait_for_callback(
    listener: &TcpListener,
    expected_state: &str,
) -> Result<String, FlowError> {
    loop {
        let (mut socket, _) = listener.accept().await.map_err(FlowError::Callback)?;

        let mut reader = BufReader::new(&mut socket);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .await
            .map_err(FlowError::Callback)?;

        // "GET /path?query HTTP/1.1"
        let Some(path_and_query) = request_line.split_whitespace().nth(1) else {
            continue;
        };
        let query = path_and_query
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or("");
        let params = parse_query_params(query);

        if let (Some(code), Some(state)) = (params.get("code"), params.get("state")) {
            if state != expected_state {
                respond(
                    &mut socket,
                    "400 Bad Request",
                    "Error: Invalid state parameter. Please try again.",
                )
                .await;
                return Err(FlowError::StateMismatch);
            }
            respond(
                &mut socket,
                "200 OK",
                "Authentication successful! You can close this tab.",
            )
            .await;
            return Ok(code.clone());
        }

        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .cloned()
                .unwrap_or_else(|| "Unknown error".to_string());
            respond(
                &mut socket,
                "400 Bad Request",
                &format!("Error: {} - {}", error, description),
            )
            .await;
            return Err(FlowError::Denied {
                error: error.clone(),
                description,
            });
        }

        debug!("Ignoring unrelated request on callback server: {}", path_and_query);
        respond(&mut socket, "404 Not Found", "Not found").await;
    }
}

/// Parse URL query parameters into a HashMap
pub(crate) fn parse_query_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let decoded = urlencoding::decode(value).ok()?;
            Some((key.to_string(), decoded.into_owned()))
        })
        .collect()
}

/// Send a small HTML page back to the browser. Delivery is best-effort.
async fn respond(socket: &mut TcpStream, status: &str, message: &str) {
    let html = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Tidings</title></head>\
         <body style=\"font-family: sans-serif; text-align: center; margin-top: 4rem;\">\
         <h1>Tidings</h1><p>{}</p></body></html>",
        message
    );
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        html.len(),
        html
    );
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        debug!("Failed to answer browser: {}", e);
        return;
    }
    let _ = socket.flush().await;
}

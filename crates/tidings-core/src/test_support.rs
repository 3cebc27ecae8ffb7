//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::auth::credential::Credential;
use crate::auth::flow::{parse_query_params, BrowserLauncher};
use crate::auth::provider::{
    OAuthClient, OAuthProvider, OAuthTokens, ProviderError, GOOGLE_AUTH_ENDPOINT,
    GOOGLE_TOKEN_ENDPOINT,
};
use crate::auth::store::CredentialStore;
use crate::auth::{CredentialManager, ManagerConfig};
use crate::clock::ManualClock;
use crate::google::client::{ApiError, ApiRequest, ApiTransport};

pub(crate) fn oauth_client() -> OAuthClient {
    OAuthClient {
        client_id: "test-client.apps.googleusercontent.com".to_string(),
        client_secret: "test-secret".to_string(),
        auth_uri: GOOGLE_AUTH_ENDPOINT.to_string(),
        token_uri: GOOGLE_TOKEN_ENDPOINT.to_string(),
    }
}

pub(crate) fn scripted_tokens(access: &str, refresh: Option<&str>) -> OAuthTokens {
    OAuthTokens {
        access_token: access.to_string(),
        refresh_token: refresh.map(String::from),
        token_type: "Bearer".to_string(),
        expires_in: Some(3600),
        scopes: Vec::new(),
    }
}

pub(crate) fn write_app_credentials(dir: &Path) {
    let json = serde_json::json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": GOOGLE_AUTH_ENDPOINT,
            "token_uri": GOOGLE_TOKEN_ENDPOINT,
            "redirect_uris": ["http://localhost"]
        }
    });
    std::fs::write(dir.join("credentials.json"), json.to_string()).unwrap();
}

pub(crate) fn write_credential(
    path: &Path,
    access: &str,
    refresh: Option<&str>,
    expiry: DateTime<Utc>,
) {
    let credential = Credential {
        access_token: access.to_string(),
        refresh_token: refresh.map(String::from),
        token_type: "Bearer".to_string(),
        expiry: Some(expiry),
        scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
        client_id: Some("test-client.apps.googleusercontent.com".to_string()),
        client_secret: Some("test-secret".to_string()),
        token_uri: None,
    };
    CredentialStore::new(path).save(&credential).unwrap();
}

fn test_config(dir: &Path) -> ManagerConfig {
    ManagerConfig {
        service: "Test Service".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
        token_path: dir.join("token.json"),
        app_credentials_path: dir.join("credentials.json"),
        auth_timeout: Duration::from_secs(5),
    }
}

/// Manager whose browser never calls back.
pub(crate) fn manager_with(
    dir: &Path,
    provider: Arc<StubProvider>,
    clock: Arc<ManualClock>,
) -> CredentialManager {
    manager_with_browser(
        dir,
        provider,
        Arc::new(CallbackBrowser::new(CallbackReply::Nothing)),
        clock,
    )
}

pub(crate) fn manager_with_browser(
    dir: &Path,
    provider: Arc<StubProvider>,
    browser: Arc<CallbackBrowser>,
    clock: Arc<ManualClock>,
) -> CredentialManager {
    CredentialManager::new(test_config(dir), provider, browser, clock)
}

// ── OAuth provider ──────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct StubProvider {
    exchanges: Mutex<VecDeque<Result<OAuthTokens, ProviderError>>>,
    refreshes: Mutex<VecDeque<Result<OAuthTokens, ProviderError>>>,
    exchanged_codes: Mutex<Vec<String>>,
    refresh_calls: AtomicUsize,
    refresh_delay: Option<Duration>,
}

impl StubProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub(crate) fn push_exchange(&self, result: Result<OAuthTokens, ProviderError>) {
        self.exchanges.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_refresh(&self, result: Result<OAuthTokens, ProviderError>) {
        self.refreshes.lock().unwrap().push_back(result);
    }

    pub(crate) fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes.lock().unwrap().clone()
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

fn unscripted() -> ProviderError {
    ProviderError::Transport("no scripted response".to_string())
}

#[async_trait]
impl OAuthProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn exchange_code(
        &self,
        _client: &OAuthClient,
        code: &str,
        _code_verifier: &str,
        _redirect_uri: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        let next = self.exchanges.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted()))
    }

    async fn refresh_token(
        &self,
        _client: &OAuthClient,
        _refresh_token: &str,
    ) -> Result<OAuthTokens, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.refreshes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted()))
    }
}

// ── Browser ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) enum CallbackReply {
    /// Redirect back with this authorization code and the right state.
    Code(&'static str),
    /// Redirect back with a forged state.
    WrongState(&'static str),
    /// Redirect back with `error=<value>`, as when the user declines.
    Error(&'static str),
    /// Never redirect.
    Nothing,
}

/// Plays the user's browser: reads the consent URL and requests the loopback
/// redirect, after a stray favicon request.
pub(crate) struct CallbackBrowser {
    reply: CallbackReply,
}

impl CallbackBrowser {
    pub(crate) fn new(reply: CallbackReply) -> Self {
        Self { reply }
    }
}

impl BrowserLauncher for CallbackBrowser {
    fn launch(&self, url: &str) -> Result<(), String> {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        let params = parse_query_params(query);
        let redirect = params.get("redirect_uri").cloned().ok_or("no redirect_uri")?;
        let state = params.get("state").cloned().ok_or("no state")?;

        let callback = match self.reply {
            CallbackReply::Code(code) => format!(
                "{}/?code={}&state={}",
                redirect,
                urlencoding::encode(code),
                state
            ),
            CallbackReply::WrongState(code) => {
                format!("{}/?code={}&state=forged", redirect, urlencoding::encode(code))
            }
            CallbackReply::Error(error) => format!("{}/?error={}", redirect, error),
            CallbackReply::Nothing => return Ok(()),
        };

        tokio::spawn(async move {
            let http = reqwest::Client::builder().no_proxy().build().unwrap();
            let _ = http.get(format!("{}/favicon.ico", redirect)).send().await;
            let _ = http.get(callback).send().await;
        });
        Ok(())
    }
}

// ── API transport ───────────────────────────────────────────────────────────

type Handler = Box<dyn Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync>;

/// Records every request and answers from a handler closure.
pub(crate) struct StubTransport {
    handler: Handler,
    calls: Mutex<Vec<(String, ApiRequest)>>,
}

impl StubTransport {
    pub(crate) fn new(
        handler: impl Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub(crate) fn tokens(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }
}

#[async_trait]
impl ApiTransport for StubTransport {
    async fn execute(&self, access_token: &str, request: ApiRequest) -> Result<Value, ApiError> {
        let response = (self.handler)(&request);
        self.calls
            .lock()
            .unwrap()
            .push((access_token.to_string(), request));
        response
    }
}

// ── Canned HTTP server ──────────────────────────────────────────────────────

/// reqwest client that ignores proxy settings, for loopback servers.
pub(crate) fn direct_http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Serve one canned response on a loopback port. Returns the base URL and a
/// handle yielding the raw request (head and body) the server received.
pub(crate) async fn serve_once(
    status: &str,
    content_type: &str,
    body: &str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = String::new();
        {
            let mut reader = BufReader::new(&mut socket);
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).await.unwrap();
            request.push_str(&String::from_utf8_lossy(&payload));
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.flush().await;
        request
    });

    (base, handle)
}

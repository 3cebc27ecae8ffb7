//! Gmail tool
//!
//! Sends plain-text mail and retrieves messages through Gmail API v1.
//! Every operation goes through the credential pre-check in
//! [`executor`](super::executor).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::client::{get_paginated, ApiError, ApiRequest, ApiTransport};
use super::common::path_segment;
use super::executor::run_authorized;
use crate::auth::{AuthStatus, CredentialManager, ManagerConfig};
use crate::common::OperationResult;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

pub const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
];

pub const DEFAULT_MAX_RESULTS: usize = 10;

const METADATA_HEADERS: &[&str] = &["From", "To", "Subject", "Date"];

/// An outgoing message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub from: Option<String>,
}

impl SendEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentEmail {
    pub message_id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedEmails {
    pub emails: Vec<EmailSummary>,
}

pub struct GmailTool {
    credentials: Arc<CredentialManager>,
    transport: Arc<dyn ApiTransport>,
}

impl GmailTool {
    pub fn new(credentials: Arc<CredentialManager>, transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    /// Credential manager settings for a Gmail tool instance.
    pub fn manager_config(
        app_credentials_path: PathBuf,
        token_path: PathBuf,
        auth_timeout: Duration,
    ) -> ManagerConfig {
        ManagerConfig {
            service: "Gmail".to_string(),
            scopes: GMAIL_SCOPES.iter().map(|s| s.to_string()).collect(),
            token_path,
            app_credentials_path,
            auth_timeout,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub async fn get_auth_status(&self) -> AuthStatus {
        self.credentials.get_status().await
    }

    pub async fn authenticate(&self) -> OperationResult<()> {
        self.credentials.authenticate().await
    }

    /// Send a plain-text email.
    pub async fn send_email(&self, email: &SendEmail) -> OperationResult<SentEmail> {
        run_authorized(&self.credentials, "send_email", |token| async move {
            info!("Sending Gmail message to: {:?}", email.to);

            let raw = base64_url_encode(build_raw_message(email).as_bytes());
            let url = format!("{}/users/me/messages/send", GMAIL_API_BASE);
            let response = self
                .transport
                .execute(&token, ApiRequest::post(url, json!({ "raw": raw })))
                .await?;

            let message_id = response
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ApiError::Decode("send response has no message id".into()))?
                .to_string();
            let thread_id = response
                .get("threadId")
                .and_then(Value::as_str)
                .map(String::from);

            info!("Message sent successfully");
            Ok::<_, ApiError>((
                SentEmail {
                    message_id,
                    thread_id,
                },
                "Email sent successfully.".to_string(),
            ))
        })
        .await
    }

    /// Retrieve up to `max_results` messages matching a Gmail search query.
    ///
    /// Without `include_body` only the metadata headers are fetched.
    pub async fn retrieve_emails(
        &self,
        query: Option<&str>,
        max_results: usize,
        include_body: bool,
    ) -> OperationResult<RetrievedEmails> {
        run_authorized(&self.credentials, "retrieve_emails", |token| async move {
            info!("Listing Gmail messages");

            let mut list = ApiRequest::get(format!("{}/users/me/messages", GMAIL_API_BASE));
            if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
                list = list.query("q", q);
            }
            let refs = get_paginated(self.transport.as_ref(), &token, list, "messages", max_results)
                .await?;
            debug!("Retrieved {} message ids", refs.len());

            let mut emails = Vec::with_capacity(refs.len());
            for id in refs.iter().filter_map(|r| r.get("id").and_then(Value::as_str)) {
                let mut request = ApiRequest::get(format!(
                    "{}/users/me/messages/{}",
                    GMAIL_API_BASE,
                    path_segment(id)
                ));
                if include_body {
                    request = request.query("format", "full");
                } else {
                    request = request.query("format", "metadata");
                    for header in METADATA_HEADERS {
                        request = request.query("metadataHeaders", *header);
                    }
                }

                let message = self.transport.execute(&token, request).await?;
                emails.push(summarize_message(&message, include_body));
            }

            let message = format!("Retrieved {} emails.", emails.len());
            Ok::<_, ApiError>((RetrievedEmails { emails }, message))
        })
        .await
    }
}

// ── Message encoding ────────────────────────────────────────────────────────

/// Build an RFC 2822 plain-text message.
fn build_raw_message(email: &SendEmail) -> String {
    let mut lines = Vec::new();

    if let Some(from) = email.from.as_deref().filter(|f| !f.trim().is_empty()) {
        lines.push(format!("From: {}", header_value(from)));
    }
    lines.push(format!("To: {}", address_list(&email.to)));
    if !email.cc.is_empty() {
        lines.push(format!("Cc: {}", address_list(&email.cc)));
    }
    if !email.bcc.is_empty() {
        lines.push(format!("Bcc: {}", address_list(&email.bcc)));
    }
    lines.push(format!("Subject: {}", encode_header_text(&header_value(&email.subject))));
    lines.push("MIME-Version: 1.0".to_string());
    lines.push("Content-Type: text/plain; charset=UTF-8".to_string());
    lines.push("Content-Transfer-Encoding: 8bit".to_string());
    lines.push(String::new());
    lines.push(email.body.replace("\r\n", "\n").replace('\n', "\r\n"));

    lines.join("\r\n")
}

fn address_list(addresses: &[String]) -> String {
    addresses
        .iter()
        .map(|a| header_value(a))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Header values must stay on one line.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

/// RFC 2047 encoded-word for non-ASCII header text.
fn encode_header_text(text: &str) -> String {
    if text.is_ascii() {
        text.to_string()
    } else {
        use base64::{engine::general_purpose::STANDARD, Engine};
        format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
    }
}

/// Base64url encode (no padding) per RFC 4648 §5
fn base64_url_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(data)
}

// ── Message decoding ────────────────────────────────────────────────────────

fn summarize_message(message: &Value, include_body: bool) -> EmailSummary {
    let payload = message.get("payload").unwrap_or(&Value::Null);
    let header = |name: &str| {
        payload
            .get("headers")
            .and_then(Value::as_array)
            .and_then(|headers| {
                headers.iter().find(|h| {
                    h.get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
            })
            .and_then(|h| h.get("value"))
            .and_then(Value::as_str)
            .map(String::from)
    };
    let text = |field: &str| message.get(field).and_then(Value::as_str).map(String::from);

    EmailSummary {
        id: text("id").unwrap_or_default(),
        thread_id: text("threadId"),
        from: header("From"),
        to: header("To"),
        subject: header("Subject"),
        date: header("Date"),
        snippet: text("snippet"),
        body: if include_body {
            find_part(payload, "text/plain").or_else(|| find_part(payload, "text/html"))
        } else {
            None
        },
    }
}

/// Depth-first search for the first part of `mime_type` that carries data.
fn find_part(part: &Value, mime_type: &str) -> Option<String> {
    let is_match = part
        .get("mimeType")
        .and_then(Value::as_str)
        .is_some_and(|m| m.eq_ignore_ascii_case(mime_type));
    if is_match {
        if let Some(data) = part.pointer("/body/data").and_then(Value::as_str) {
            return decode_base64_url(data);
        }
    }

    part.get("parts")
        .and_then(Value::as_array)?
        .iter()
        .find_map(|child| find_part(child, mime_type))
}

fn decode_base64_url(data: &str) -> Option<String> {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::common::ErrorCode;
    use crate::google::client::{ApiError, HttpMethod};
    use crate::test_support::{manager_with, write_credential, StubProvider, StubTransport};
    use chrono::{Duration as ChronoDuration, Utc};

    async fn tool(
        dir: &std::path::Path,
        authenticated: bool,
        transport: Arc<StubTransport>,
    ) -> GmailTool {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        if authenticated {
            write_credential(
                &dir.join("token.json"),
                "ya29.gmail",
                Some("1//r"),
                Utc::now() + ChronoDuration::hours(1),
            );
        }
        let manager = manager_with(dir, Arc::new(StubProvider::new()), clock);
        manager.load().await;
        GmailTool::new(Arc::new(manager), transport)
    }

    #[test]
    fn test_base64_url_encode() {
        let encoded = base64_url_encode(b"Hello, World!?>");
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn test_build_raw_message() {
        let mut email =
            SendEmail::new("alice@example.com", "Meeting Tomorrow", "Hi Alice,\nSee you.");
        email.cc = vec!["bob@example.com".to_string()];
        email.from = Some("me@example.com".to_string());

        let raw = build_raw_message(&email);
        assert!(raw.starts_with(
            "From: me@example.com\r\nTo: alice@example.com\r\nCc: bob@example.com\r\n"
        ));
        assert!(raw.contains("Subject: Meeting Tomorrow\r\n"));
        assert!(!raw.contains("Bcc:"));
        assert!(raw.ends_with("\r\n\r\nHi Alice,\r\nSee you."));
    }

    #[test]
    fn test_header_injection_is_flattened() {
        let email = SendEmail::new("a@example.com", "Hi\r\nBcc: victim@example.com", "body");
        let raw = build_raw_message(&email);
        assert!(!raw.contains("\r\nBcc: victim"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let email = SendEmail::new("a@example.com", "Café ☕", "body");
        let raw = build_raw_message(&email);
        assert!(raw.contains("Subject: =?UTF-8?B?"));
    }

    #[test]
    fn test_summarize_metadata_message() {
        let message = json!({
            "id": "m1",
            "threadId": "t1",
            "snippet": "See you there",
            "payload": {
                "headers": [
                    {"name": "From", "value": "alice@example.com"},
                    {"name": "subject", "value": "Meeting Tomorrow"},
                    {"name": "Date", "value": "Mon, 11 Aug 2025 09:00:00 +0000"}
                ]
            }
        });
        let summary = summarize_message(&message, false);
        assert_eq!(summary.id, "m1");
        assert_eq!(summary.from.as_deref(), Some("alice@example.com"));
        assert_eq!(summary.subject.as_deref(), Some("Meeting Tomorrow"));
        assert!(summary.to.is_none());
        assert!(summary.body.is_none());
    }

    #[test]
    fn test_body_prefers_plain_text_in_nested_parts() {
        let message = json!({
            "id": "m2",
            "payload": {
                "mimeType": "multipart/mixed",
                "parts": [{
                    "mimeType": "multipart/alternative",
                    "parts": [
                        {
                            "mimeType": "text/html",
                            "body": {"data": base64_url_encode(b"<p>html</p>")}
                        },
                        {
                            "mimeType": "text/plain",
                            "body": {"data": base64_url_encode("plain ✓".as_bytes())}
                        }
                    ]
                }]
            }
        });
        assert_eq!(summarize_message(&message, true).body.as_deref(), Some("plain ✓"));
    }

    #[test]
    fn test_body_falls_back_to_html() {
        let message = json!({
            "id": "m3",
            "payload": {"mimeType": "text/html", "body": {"data": "PGI-aGk8L2I-"}}
        });
        assert_eq!(summarize_message(&message, true).body.as_deref(), Some("<b>hi</b>"));
    }

    #[tokio::test]
    async fn test_operations_require_auth_without_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(|_| Ok(json!({}))));
        let gmail = tool(dir.path(), false, transport.clone()).await;

        let sent = gmail.send_email(&SendEmail::new("a@example.com", "s", "b")).await;
        let listed = gmail.retrieve_emails(None, 5, false).await;

        assert_eq!(sent.error_code(), Some(ErrorCode::AuthRequired));
        assert_eq!(listed.error_code(), Some(ErrorCode::AuthRequired));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_email_success() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(|_| {
            Ok(json!({"id": "18c1", "threadId": "18c0", "labelIds": ["SENT"]}))
        }));
        let gmail = tool(dir.path(), true, transport.clone()).await;

        let result = gmail
            .send_email(&SendEmail::new("alice@example.com", "Hello", "Body"))
            .await;

        assert!(result.is_success());
        let sent = result.data().unwrap();
        assert_eq!(sent.message_id, "18c1");
        assert_eq!(sent.thread_id.as_deref(), Some("18c0"));

        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert!(request.url.ends_with("/users/me/messages/send"));
        let raw = request.body.as_ref().unwrap()["raw"].as_str().unwrap();
        let decoded = decode_base64_url(raw).unwrap();
        assert!(decoded.contains("To: alice@example.com"));
        assert_eq!(transport.tokens(), vec!["ya29.gmail".to_string()]);
    }

    #[tokio::test]
    async fn test_send_email_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(|_| {
            Err(ApiError::Provider {
                status: 400,
                reason: "Invalid To header".to_string(),
            })
        }));
        let gmail = tool(dir.path(), true, transport).await;

        let result = gmail.send_email(&SendEmail::new("not-an-address", "s", "b")).await;

        assert_eq!(result.error_code(), Some(ErrorCode::Provider(400)));
        assert_eq!(result.message(), "Gmail API error: Invalid To header");
    }

    #[tokio::test]
    async fn test_send_email_transport_error_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(|_| {
            Err(ApiError::Transport("connection refused".to_string()))
        }));
        let gmail = tool(dir.path(), true, transport).await;

        let result = gmail.send_email(&SendEmail::new("a@example.com", "s", "b")).await;

        assert_eq!(result.error_code(), Some(ErrorCode::UnknownError));
        assert!(result.message().starts_with("Unexpected error: "));
    }

    #[tokio::test]
    async fn test_retrieve_emails_fetches_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(|req| {
            if req.url.ends_with("/users/me/messages") {
                Ok(json!({"messages": [
                    {"id": "m1", "threadId": "t1"},
                    {"id": "m2", "threadId": "t2"}
                ]}))
            } else {
                let id = req.url.rsplit('/').next().unwrap();
                Ok(json!({
                    "id": id,
                    "payload": {
                        "headers": [{"name": "Subject", "value": format!("subject {}", id)}]
                    }
                }))
            }
        }));
        let gmail = tool(dir.path(), true, transport.clone()).await;

        let result = gmail.retrieve_emails(Some("is:unread"), 5, false).await;

        assert!(result.is_success());
        assert_eq!(result.message(), "Retrieved 2 emails.");
        let emails = &result.data().unwrap().emails;
        assert_eq!(emails[1].subject.as_deref(), Some("subject m2"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].query_value("q"), Some("is:unread"));
        assert_eq!(requests[0].query_value("maxResults"), Some("5"));
        assert_eq!(requests[1].query_value("format"), Some("metadata"));
    }

    #[tokio::test]
    async fn test_retrieve_emails_with_body_uses_full_format() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StubTransport::new(|req| {
            if req.url.ends_with("/users/me/messages") {
                Ok(json!({"messages": [{"id": "m1"}]}))
            } else {
                Ok(json!({
                    "id": "m1",
                    "payload": {
                        "mimeType": "text/plain",
                        "body": {"data": base64_url_encode(b"hello")}
                    }
                }))
            }
        }));
        let gmail = tool(dir.path(), true, transport.clone()).await;

        let result = gmail.retrieve_emails(None, 1, true).await;

        assert_eq!(result.data().unwrap().emails[0].body.as_deref(), Some("hello"));
        assert_eq!(transport.requests()[1].query_value("format"), Some("full"));
        assert_eq!(transport.requests()[0].query_value("q"), None);
    }
}

//! Google API Authenticated HTTP Client
//!
//! Requests are plain values handed to an [`ApiTransport`] together with the
//! access token, so the tools never hold a token longer than one call.
//! [`GoogleClient`] is the reqwest-backed transport; it maps Google's REST
//! error payloads onto [`ApiError::Provider`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::common::create_http_client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// First value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with an error status.
    #[error("{reason}")]
    Provider { status: u16, reason: String },
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(&self, access_token: &str, request: ApiRequest) -> Result<Value, ApiError>;
}

/// Google API HTTP client with bearer token injection
pub struct GoogleClient {
    client: Client,
}

impl GoogleClient {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self {
            client: create_http_client(30)?,
        })
    }
}

#[async_trait]
impl ApiTransport for GoogleClient {
    async fn execute(&self, access_token: &str, request: ApiRequest) -> Result<Value, ApiError> {
        debug!("Executing Google API request: {:?} {}", request.method, request.url);

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };
        let mut builder = builder.query(&request.query).bearer_auth(access_token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by Google API");
            return Err(ApiError::Provider {
                status: status.as_u16(),
                reason: "Rate limited. Please try again later.".to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
            let reason = extract_error_message(&parsed, status);
            error!("Google API error {}: {}", status.as_u16(), reason);
            return Err(ApiError::Provider {
                status: status.as_u16(),
                reason,
            });
        }

        // Empty successful responses (e.g., DELETE)
        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Provider-supplied reason from a Google API error body:
///
/// ```json
/// { "error": { "code": 404, "message": "Not Found", "errors": [...] } }
/// ```
///
/// Falls back to the canonical reason of the status code.
fn extract_error_message(response: &Value, status: StatusCode) -> String {
    let error_obj = response.get("error");

    if let Some(message) = error_obj
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
    {
        return message.to_string();
    }

    // OAuth-style errors: { "error": "invalid_token", "error_description": "..." }
    if let Some(code) = error_obj.and_then(|v| v.as_str()) {
        return match response.get("error_description").and_then(|v| v.as_str()) {
            Some(desc) => format!("{}: {}", code, desc),
            None => code.to_string(),
        };
    }

    status
        .canonical_reason()
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Collect items across pages until `max_results` items are gathered or the
/// API stops returning `nextPageToken`.
///
/// The first page is always requested, so the API validates `max_results`
/// itself (a zero limit is forwarded, not short-circuited).
pub async fn get_paginated(
    transport: &dyn ApiTransport,
    access_token: &str,
    base: ApiRequest,
    items_field: &str,
    max_results: usize,
) -> Result<Vec<Value>, ApiError> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let remaining = max_results.saturating_sub(all_items.len());
        let mut request = base.clone().query("maxResults", remaining.to_string());
        if let Some(token) = page_token.take() {
            request = request.query("pageToken", token);
        }

        let response = transport.execute(access_token, request).await?;
        all_items.extend(super::common::extract_array(&response, items_field));
        if all_items.len() >= max_results {
            break;
        }

        match response.get("nextPageToken").and_then(|v| v.as_str()) {
            Some(next) => page_token = Some(next.to_string()),
            None => break,
        }
    }

    all_items.truncate(max_results);
    Ok(all_items)
}

//! App credentials
//!
//! Reads the client-secret descriptor downloaded from the Google Cloud
//! console. Both the `installed` and `web` wrappers are accepted, as is a
//! flat object.

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::provider::{OAuthClient, GOOGLE_AUTH_ENDPOINT, GOOGLE_TOKEN_ENDPOINT};

#[derive(Debug, Error)]
pub enum AppCredentialsError {
    #[error("App credentials file {path:?} could not be read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("App credentials file {path:?} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("App credentials file {path:?} has no client_id")]
    MissingClientId { path: PathBuf },
}

#[derive(Deserialize)]
struct RawClient {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

pub fn load_app_credentials(path: &Path) -> Result<OAuthClient, AppCredentialsError> {
    let content = fs::read_to_string(path).map_err(|source| AppCredentialsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_app_credentials(&content, path)
}

fn parse_app_credentials(content: &str, path: &Path) -> Result<OAuthClient, AppCredentialsError> {
    let parse_err = |source| AppCredentialsError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut root: Value = serde_json::from_str(content).map_err(parse_err)?;
    let inner = match root.get_mut("installed").map(Value::take) {
        Some(v) => v,
        None => match root.get_mut("web").map(Value::take) {
            Some(v) => v,
            None => root,
        },
    };
    let raw: RawClient = serde_json::from_value(inner).map_err(parse_err)?;

    if raw.client_id.trim().is_empty() {
        return Err(AppCredentialsError::MissingClientId {
            path: path.to_path_buf(),
        });
    }

    Ok(OAuthClient {
        client_id: raw.client_id.trim().to_string(),
        client_secret: raw.client_secret.trim().to_string(),
        auth_uri: raw
            .auth_uri
            .unwrap_or_else(|| GOOGLE_AUTH_ENDPOINT.to_string()),
        token_uri: raw
            .token_uri
            .unwrap_or_else(|| GOOGLE_TOKEN_ENDPOINT.to_string()),
    })
}

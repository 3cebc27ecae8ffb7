//! Common Error Types
//!
//! Error codes carried by the `error_code` field of every operation envelope.

use serde::{Serialize, Serializer};
use std::fmt;

/// Envelope error codes.
///
/// `Provider` carries the HTTP status the remote API answered with and is
/// serialized as that number; every other code serializes as its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No usable credential; the caller must run `authenticate()` first.
    AuthRequired,
    /// The interactive consent flow itself failed.
    AuthFlowFailed,
    /// The remote API rejected the request.
    Provider(u16),
    /// Local or transport fault not specific to the provider.
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::AuthFlowFailed => "AUTH_FLOW_FAILED",
            ErrorCode::Provider(_) => "PROVIDER_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status reported by the provider, if this is a provider error.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            ErrorCode::Provider(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Provider(status) => write!(f, "{} ({})", self.as_str(), status),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ErrorCode::Provider(status) => serializer.serialize_u16(*status),
            other => serializer.serialize_str(other.as_str()),
        }
    }
}

//! Operation Result Envelope
//!
//! Every tool operation answers with an [`OperationResult`]. On the wire it is
//! the flat envelope `{success, message, error_code?, ...data}`.

use serde::{Serialize, Serializer};

use super::error::ErrorCode;

/// Outcome of a single tool operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Success { message: String, data: T },
    Failure { message: String, error_code: ErrorCode },
}

impl<T> OperationResult<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        OperationResult::Success {
            message: message.into(),
            data,
        }
    }

    pub fn failure(error_code: ErrorCode, message: impl Into<String>) -> Self {
        OperationResult::Failure {
            message: message.into(),
            error_code,
        }
    }

    /// The distinguished "call authenticate() before retrying" failure.
    pub fn auth_required() -> Self {
        Self::failure(
            ErrorCode::AuthRequired,
            "Authentication required. Please call authenticate() first.",
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            OperationResult::Success { message, .. } | OperationResult::Failure { message, .. } => {
                message
            }
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            OperationResult::Success { .. } => None,
            OperationResult::Failure { error_code, .. } => Some(*error_code),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            OperationResult::Success { data, .. } => Some(data),
            OperationResult::Failure { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            OperationResult::Success { data, .. } => Some(data),
            OperationResult::Failure { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        match self {
            OperationResult::Success { message, data } => OperationResult::Success {
                message,
                data: f(data),
            },
            OperationResult::Failure {
                message,
                error_code,
            } => OperationResult::Failure {
                message,
                error_code,
            },
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    #[serde(flatten)]
    data: Option<&'a T>,
}

impl<T: Serialize> Serialize for OperationResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = Envelope {
            success: self.is_success(),
            message: self.message(),
            error_code: self.error_code(),
            data: self.data(),
        };
        envelope.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Created {
        event_id: String,
    }

    #[test]
    fn test_success_flattens_data() {
        let result = OperationResult::success(
            "Event created successfully.",
            Created {
                event_id: "evt1".to_string(),
            },
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "message": "Event created successfully.",
                "event_id": "evt1"
            })
        );
    }

    #[test]
    fn test_success_without_data() {
        let result = OperationResult::success("Event deleted successfully.", ());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "success": true, "message": "Event deleted successfully." })
        );
    }

    #[test]
    fn test_auth_required_envelope() {
        let result: OperationResult<Created> = OperationResult::auth_required();
        assert!(!result.is_success());
        assert_eq!(result.error_code(), Some(ErrorCode::AuthRequired));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error_code"], json!("AUTH_REQUIRED"));
        assert!(value["message"]
            .as_str()
            .unwrap()
            .starts_with("Authentication required"));
    }

    #[test]
    fn test_map_keeps_failure() {
        let result: OperationResult<u32> =
            OperationResult::failure(ErrorCode::Provider(404), "Not Found");
        let mapped = result.map(|n| n + 1);
        assert_eq!(mapped.error_code(), Some(ErrorCode::Provider(404)));
        assert_eq!(mapped.message(), "Not Found");
    }
}

//! Operation executor
//!
//! The pre-check and error mapping shared by every remote operation: no valid
//! credential means `AUTH_REQUIRED` and no remote call; provider rejections
//! keep the provider's status and reason; anything else is `UNKNOWN_ERROR`.

use std::future::Future;
use tracing::{debug, warn};

use super::client::ApiError;
use crate::auth::CredentialManager;
use crate::common::{ErrorCode, OperationResult};

/// Successful remote outcome: payload plus the envelope message.
pub(crate) type Completed<T> = (T, String);

pub(crate) async fn run_authorized<T, F, Fut>(
    credentials: &CredentialManager,
    operation: &str,
    call: F,
) -> OperationResult<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<Completed<T>, ApiError>>,
{
    let Some(access_token) = credentials.access_token().await else {
        warn!(
            "{}: {} skipped, no valid credential",
            credentials.service(),
            operation
        );
        return OperationResult::auth_required();
    };

    debug!("{}: running {}", credentials.service(), operation);

    match call(access_token).await {
        Ok((data, message)) => OperationResult::success(message, data),
        Err(ApiError::Provider { status, reason }) => {
            warn!(
                "{}: {} rejected by provider ({}): {}",
                credentials.service(),
                operation,
                status,
                reason
            );
            OperationResult::failure(
                ErrorCode::Provider(status),
                format!("{} API error: {}", credentials.service(), reason),
            )
        }
        Err(other) => {
            warn!("{}: {} failed: {}", credentials.service(), operation, other);
            OperationResult::failure(
                ErrorCode::UnknownError,
                format!("Unexpected error: {}", other),
            )
        }
    }
}

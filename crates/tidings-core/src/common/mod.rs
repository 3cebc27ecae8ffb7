//! Common Utilities
//!
//! Shared types, error codes, and helpers used by both tool instances.

pub mod error;
pub mod http;
pub mod paths;
pub mod result;

pub use error::ErrorCode;
pub use http::create_http_client;
pub use paths::{tidings_dir, tidings_path};
pub use result::OperationResult;

//! Shared utilities for Google API modules
//!
//! Reduces duplication across the Calendar and Gmail tools.

use serde_json::Value;

/// Extract an array field from a JSON response, returning an empty vec if missing.
///
/// Google APIs return lists under varying field names ("items", "messages", "labels").
pub fn extract_array(response: &Value, field: &str) -> Vec<Value> {
    response
        .get(field)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Percent-encode a caller-supplied identifier for use as one URL path segment.
pub fn path_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

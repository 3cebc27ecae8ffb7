//! Path Utilities
//!
//! Default locations for app credentials and token stores.

use std::path::PathBuf;

/// Get the Tidings base directory (`~/.tidings/`)
pub fn tidings_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tidings"))
}

/// Get a path within the Tidings directory, falling back to `./.tidings`
/// when no home directory can be determined.
pub fn tidings_path(relative_path: &str) -> PathBuf {
    tidings_dir()
        .unwrap_or_else(|| PathBuf::from(".tidings"))
        .join(relative_path)
}

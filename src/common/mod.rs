//! Common utilities shared by the framework, the test runner and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Normalize a human readable name into an identifier
///
/// Trims, replaces spaces and dashes with underscores and lowercases, so
/// "Form Authentication" becomes "form_authentication".
pub fn sanitize(value: &str) -> String {
    let sanitized = value.trim().replace([' ', '-'], "_").to_lowercase();
    tracing::debug!("sanitized [{}] to [{}]", value, sanitized);
    sanitized
}

//! Error types for the harness
//!
//! Verb failures are classified so the dispatch layer can log each class with
//! its own message before reporting a plain pass/fail to the test case.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Driver Errors ===
    #[error("Failed to start a {browser} session at {url}: {reason}")]
    SessionStartFailed {
        browser: String,
        url: String,
        reason: String,
    },

    #[error("Browser type [{0}] unknown")]
    UnknownBrowser(String),

    #[error("No driver is active. Call get_driver first")]
    DriverNotActive,

    #[error("WebDriver service error: {0}")]
    WebDriverService(String),

    #[error("Timed out waiting for element: value: {value}, by: {by}, wait: {wait_secs}s")]
    Timeout {
        value: String,
        by: String,
        wait_secs: f64,
    },

    #[error("Failed to find element {0}")]
    NoSuchElement(String),

    #[error("Element is not visible, so cannot be interacted with: {0}")]
    ElementNotVisible(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("WebDriver command failed: {0}")]
    WebDriver(String),

    #[error("Javascript error: {0}")]
    JavaScript(String),

    // === Verb Errors ===
    #[error("Unknown {family} verb '{name}'")]
    UnknownVerb { family: String, name: String },

    #[error("Verb '{verb}' is missing required argument '{param}'")]
    MissingArgument { verb: String, param: String },

    #[error("Assertion Error: {0}")]
    Assertion(String),

    // === Test Errors ===
    #[error("Test case [{0}] was not found")]
    TestNotFound(String),

    #[error("Suite '{0}' was not found in the test index")]
    SuiteNotFound(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid fixture '{path}': {error}")]
    Fixture { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Failed to write file '{path}': {error}")]
    FileWrite { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an element wait timeout error
    pub fn timeout(value: &str, by: &str, wait_secs: f64) -> Self {
        Self::Timeout {
            value: value.to_string(),
            by: by.to_string(),
            wait_secs,
        }
    }

    /// Create an unknown verb error
    pub fn unknown_verb(family: &str, name: &str) -> Self {
        Self::UnknownVerb {
            family: family.to_string(),
            name: name.to_string(),
        }
    }

    /// Create a missing argument error
    pub fn missing_argument(verb: &str, param: &str) -> Self {
        Self::MissingArgument {
            verb: verb.to_string(),
            param: param.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a file write error
    pub fn file_write(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileWrite {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a fixture parse error
    pub fn fixture(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::Fixture {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Stable code used when logging why a verb failed
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UnknownVerb { .. } => ErrorClass::UnknownVerb,
            Error::Timeout { .. } => ErrorClass::Timeout,
            Error::NoSuchElement(_) => ErrorClass::NoSuchElement,
            Error::ElementNotVisible(_) => ErrorClass::NotVisible,
            Error::Assertion(_) => ErrorClass::Assertion,
            _ => ErrorClass::Unhandled,
        }
    }
}

/// Failure classes distinguished by the verb dispatchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UnknownVerb,
    Timeout,
    NoSuchElement,
    NotVisible,
    Assertion,
    Unhandled,
}

impl From<fantoccini::error::CmdError> for Error {
    fn from(e: fantoccini::error::CmdError) -> Self {
        use fantoccini::error::{CmdError, ErrorStatus};

        match &e {
            CmdError::Standard(wd) => match wd.error {
                ErrorStatus::NoSuchElement => Error::NoSuchElement(wd.message.to_string()),
                ErrorStatus::ElementNotInteractable => {
                    Error::ElementNotVisible(wd.message.to_string())
                }
                ErrorStatus::StaleElementReference => Error::StaleElement(wd.message.to_string()),
                ErrorStatus::JavascriptError => Error::JavaScript(wd.message.to_string()),
                _ => Error::WebDriver(e.to_string()),
            },
            _ => Error::WebDriver(e.to_string()),
        }
    }
}

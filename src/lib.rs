//! SLAP - a browser test-automation harness
//!
//! Test cases are YAML step lists calling named verbs (`go_to`, `dialog`,
//! `verify`) that drive a WebDriver session, with environment scoped test
//! data and a JSON run report.

pub mod cli;
pub mod commands;
pub mod common;
pub mod data;
pub mod framework;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use framework::{Core, Driver, TiCore};

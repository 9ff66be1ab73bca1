//! Fixture data read from YAML: environment test data and failure messages

pub mod error_codes;
pub mod test_data;

pub use error_codes::ErrorCatalog;
pub use test_data::{map_yaml, TestData};

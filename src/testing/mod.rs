//! Test cases: suite files, discovery, execution and reporting

pub mod config;
pub mod discovery;
pub mod doc;
pub mod report;
pub mod runner;
pub mod template;

pub use discovery::{FoundTest, TestCatalog};
pub use doc::TestDoc;
pub use report::{HostInfo, RunReport, TestRecord};
pub use runner::TestRunner;
pub use template::{assert_false, assert_true, Outcome, TestTemplate};

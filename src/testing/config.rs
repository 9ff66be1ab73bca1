//! Test suite configuration types
//!
//! Defines the data structures for deserializing YAML test suites and the
//! test index that groups suites by project.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::common::{Error, Result};
use crate::framework::verb::Keywords;

/// Project name to suite names, in file order
pub type TestIndex = IndexMap<String, Vec<String>>;

/// Load the test index (`test_cases.yaml`)
pub fn load_index(path: &Path) -> Result<TestIndex> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    serde_yaml::from_str(&content).map_err(|e| Error::fixture(path, e))
}

/// A suite of test cases loaded from one YAML file
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Suite {
    /// Display name, defaults to the file stem
    pub name: Option<String>,
    /// Optional description of what the suite covers
    pub description: Option<String>,
    /// Tags shared by every test in the suite
    #[serde(default)]
    pub tags: Vec<String>,
    /// The test cases, in execution order
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl Suite {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let mut suite: Suite =
            serde_yaml::from_str(&content).map_err(|e| Error::fixture(path, e))?;
        if suite.name.is_none() {
            suite.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned());
        }
        Ok(suite)
    }

    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.name == name)
    }
}

/// A single test case
#[derive(Deserialize, Debug, Clone)]
pub struct TestCase {
    /// Test name, `test_<project>_<suite>_NNNN`
    pub name: String,
    /// Documentation block with `@marker` lines
    #[serde(default)]
    pub doc: String,
    /// The sequence of steps to execute
    #[serde(default)]
    pub steps: Vec<TestStep>,
}

/// Which verb family a step calls
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    GoTo,
    Dialog,
    Verify,
}

impl StepAction {
    pub fn name(self) -> &'static str {
        match self {
            StepAction::GoTo => "go_to",
            StepAction::Dialog => "dialog",
            StepAction::Verify => "verify",
        }
    }
}

/// A single verb call plus the assertion on its outcome
#[derive(Deserialize, Debug, Clone)]
pub struct TestStep {
    pub action: StepAction,
    /// Location, dialog or item name
    pub target: Option<String>,
    /// Menu for `go_to` steps
    pub menu: Option<String>,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments
    #[serde(default)]
    pub kwargs: Keywords,
    /// Shorthand for the `data` keyword
    pub data: Option<Value>,
    /// Failure message or error-catalog code
    pub message: Option<String>,
    /// Expected outcome of the verb (default: true)
    #[serde(default = "default_expect")]
    pub expect: bool,
    /// Human readable step summary, used in metadata
    pub description: Option<String>,
}

fn default_expect() -> bool {
    true
}

impl TestStep {
    /// One line summary of the step
    pub fn summary(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        match (&self.target, &self.menu) {
            (Some(target), Some(menu)) => format!("{} {} {}", self.action.name(), target, menu),
            (Some(target), None) => format!("{} {}", self.action.name(), target),
            _ => self.action.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
description: Form authentication
tags: [login]
tests:
  - name: test_toi_login_0001
    doc: |
      Log in with a valid user
      @test The secure area is reachable
    steps:
      - action: go_to
        target: The Internet
        kwargs: {url: $url}
        message: GOTO_0000
      - action: dialog
        target: Login Page
        data: {user: $user, password: $password}
      - action: verify
        target: Not Authenticated
        expect: false
        description: User is logged in
"#;

    #[test]
    fn test_parse_suite() {
        let suite: Suite = serde_yaml::from_str(SUITE).unwrap();
        assert_eq!(suite.tags, vec!["login"]);
        let case = suite.get("test_toi_login_0001").unwrap();
        assert_eq!(case.steps.len(), 3);

        let go_to = &case.steps[0];
        assert_eq!(go_to.action, StepAction::GoTo);
        assert_eq!(go_to.kwargs["url"], Value::String("$url".into()));
        assert!(go_to.expect);
        assert_eq!(go_to.summary(), "go_to The Internet");

        let verify = &case.steps[2];
        assert!(!verify.expect);
        assert_eq!(verify.summary(), "User is logged in");
        assert!(suite.get("test_toi_login_0002").is_none());
    }

    #[test]
    fn test_suite_name_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toi_login.yaml");
        std::fs::write(&path, SUITE).unwrap();
        let suite = Suite::load(&path).unwrap();
        assert_eq!(suite.name.as_deref(), Some("toi_login"));
    }

    #[test]
    fn test_load_index_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_cases.yaml");
        std::fs::write(&path, "zeta: [z_one]\nalpha: [a_one, a_two]\n").unwrap();
        let index = load_index(&path).unwrap();
        let projects: Vec<_> = index.keys().cloned().collect();
        assert_eq!(projects, vec!["zeta", "alpha"]);
        assert_eq!(index["alpha"], vec!["a_one", "a_two"]);
    }
}

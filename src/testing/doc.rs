//! Test documentation blocks
//!
//! Every test case carries a `doc` block. The first non-empty line is the
//! title, the remaining lines are picked up by their `@marker`:
//!
//! ```text
//! Login with a valid user
//! @test The secure area is reachable with good credentials
//! @arg Login Smoke
//! @attention 1
//! @version 2.4
//! @note ENV=QA ENV!=PROD
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::Serialize;

pub const MISSING_TITLE: &str = "TEST DOCUMENTATION DOES NOT INCLUDE THE TEST TITLE";
pub const MISSING_DESCRIPTION: &str = "TEST DOCUMENTATION DOES NOT INCLUDE TEST DESCRIPTION";

/// Parsed documentation of one test case
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestDoc {
    pub name: String,
    pub title: String,
    /// The `@test` line
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Bug id, empty when the test tracks none
    pub bug: String,
    /// Minimum driver version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Environments the test is limited to, upper case
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<String>,
    /// Environments the test must not run in, upper case
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_environments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

static ENV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ENV=(\w+)").expect("valid regex"));
static NOT_ENV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ENV!=(\w+)").expect("valid regex"));
static PRIORITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"priority=(\d)").expect("valid regex"));

impl TestDoc {
    pub fn parse(name: &str, text: &str) -> Self {
        let mut lines = text
            .lines()
            .map(|l| l.replace('\t', "").trim().to_string())
            .filter(|l| !l.is_empty());

        let mut doc = TestDoc {
            name: name.to_string(),
            title: lines.next().unwrap_or_else(|| MISSING_TITLE.to_string()),
            ..Default::default()
        };
        let mut description = None;

        for line in lines {
            if let Some(rest) = line.strip_prefix("@test") {
                description = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("@arg") {
                doc.tags = rest.split_whitespace().map(str::to_lowercase).collect();
            } else if let Some(rest) = line.strip_prefix("@attention") {
                doc.priority = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("@author") {
                doc.author = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("@date") {
                doc.date = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("@bug") {
                doc.bug = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("@version") {
                doc.version = Some(rest.trim().to_string());
            } else if line.starts_with("@deprecated") {
                doc.deprecated = true;
            } else if let Some(rest) = line.strip_prefix("@note") {
                doc.apply_note(rest);
            } else {
                tracing::trace!("Ignoring doc line '{}'", line);
            }
        }

        doc.description = description.unwrap_or_else(|| MISSING_DESCRIPTION.to_string());
        doc
    }

    fn apply_note(&mut self, note: &str) {
        let upper = note.to_uppercase();
        let envs: Vec<String> = ENV_RE
            .captures_iter(&upper)
            .map(|c| c[1].to_string())
            .collect();
        if !envs.is_empty() {
            self.environments = envs;
        }
        let excluded: Vec<String> = NOT_ENV_RE
            .captures_iter(&upper)
            .map(|c| c[1].to_string())
            .collect();
        if !excluded.is_empty() {
            self.excluded_environments = excluded;
        }

        match PRIORITY_RE.captures(&note.to_lowercase()) {
            Some(c) => self.priority = Some(c[1].to_string()),
            None => self.note = Some(note.trim().to_string()),
        }
    }

    /// Why this test must be skipped, if it must
    ///
    /// `environment` matches a listed environment when it contains it, so
    /// `qa2` runs tests limited to `QA`. A test with a `@version` runs when
    /// the driver version is unknown.
    pub fn ok_to_run(&self, driver_version: Option<&str>, environment: &str) -> Option<String> {
        let env = environment.to_uppercase();

        if self.deprecated {
            return Some("This test has been deprecated".to_string());
        }

        if let (Some(required), Some(current)) = (self.version.as_deref(), driver_version) {
            match (lenient_version(required), lenient_version(current)) {
                (Some(req), Some(cur)) if cur < req => {
                    return Some(format!("Features unavailable in this version: {}", required));
                }
                (None, _) | (_, None) => {
                    tracing::warn!(
                        "Cannot compare versions '{}' and '{}', running anyway",
                        required,
                        current
                    );
                }
                _ => {}
            }
        }

        if !self.environments.is_empty()
            && !self.environments.iter().any(|e| env.contains(e.as_str()))
        {
            return Some(format!("Test only works in {:?}", self.environments));
        }

        if self.excluded_environments.iter().any(|e| *e == env) {
            return Some(format!(
                "Test does not work in {:?}",
                self.excluded_environments
            ));
        }

        None
    }
}

/// Parse `2`, `2.4` or `2.4.1` as a semantic version
fn lenient_version(text: &str) -> Option<Version> {
    let text = text.trim().trim_start_matches(['v', 'V']);
    let mut parts: Vec<&str> = text.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&parts.join(".")).ok()
}

//! Finding test cases
//!
//! The test index maps each project to its suites; a suite lives in
//! `<test_case_dir>/<project>/<suite>.yaml`. Everything is loaded up front so
//! lookups and listings walk the same ordered view.

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::config::{load_index, Suite, TestCase};
use super::doc::TestDoc;
use crate::common::config::Config;
use crate::common::{Error, Result};

static TC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^test_[a-z_0-9]+?\d{4}$").expect("valid regex"));
static ANY_PROJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^test_\w+?_[a-z_]+?\d{4}$").expect("valid regex"));

/// A test case together with where it was found
#[derive(Debug, Clone)]
pub struct FoundTest {
    pub project: String,
    pub suite: String,
    /// Tags of the enclosing suite
    pub suite_tags: Vec<String>,
    pub case: TestCase,
}

impl FoundTest {
    pub fn doc(&self) -> TestDoc {
        TestDoc::parse(&self.case.name, &self.case.doc)
    }
}

/// Every suite named by the test index, keyed by project then suite
#[derive(Debug, Default)]
pub struct TestCatalog {
    projects: IndexMap<String, IndexMap<String, Suite>>,
}

impl TestCatalog {
    /// Load the index and its suites as configured
    pub fn load(config: &Config) -> Result<Self> {
        Self::from_paths(&config.test_case_file(), &config.test_case_dir())
    }

    /// Load `index_file` and the suites below `case_dir`
    ///
    /// A suite whose file is missing is skipped with a warning; a suite that
    /// does not parse is an error.
    pub fn from_paths(index_file: &Path, case_dir: &Path) -> Result<Self> {
        let index = load_index(index_file)?;
        let mut catalog = Self::default();

        for (project, suites) in index {
            let loaded = catalog.projects.entry(project.clone()).or_default();
            for suite_name in suites {
                let path = case_dir.join(&project).join(format!("{}.yaml", suite_name));
                if !path.is_file() {
                    tracing::warn!("Suite {} not found at {}", suite_name, path.display());
                    continue;
                }
                let suite = Suite::load(&path)?;
                tracing::debug!(
                    "Loaded suite {}/{} with {} tests",
                    project,
                    suite_name,
                    suite.tests.len()
                );
                loaded.insert(suite_name, suite);
            }
        }

        Ok(catalog)
    }

    fn suites(&self) -> impl Iterator<Item = (&str, &str, &Suite)> {
        self.projects.iter().flat_map(|(project, suites)| {
            suites
                .iter()
                .map(move |(name, suite)| (project.as_str(), name.as_str(), suite))
        })
    }

    /// First suite in index order that defines `name`
    pub fn find_tc(&self, name: &str) -> Option<FoundTest> {
        self.suites().find_map(|(project, suite_name, suite)| {
            suite.get(name).map(|case| FoundTest {
                project: project.to_string(),
                suite: suite_name.to_string(),
                suite_tags: suite.tags.clone(),
                case: case.clone(),
            })
        })
    }

    /// Test names defined by `suite`
    ///
    /// A suite the test index does not list is an error.
    pub fn get_tc_list(&self, suite: &str) -> Result<Vec<String>> {
        let found: Vec<&Suite> = self
            .suites()
            .filter(|(_, name, _)| *name == suite)
            .map(|(_, _, s)| s)
            .collect();
        if found.is_empty() {
            return Err(Error::SuiteNotFound(suite.to_string()));
        }

        Ok(found
            .into_iter()
            .flat_map(|s| s.tests.iter())
            .filter(|t| TC_NAME_RE.is_match(&t.name))
            .map(|t| t.name.clone())
            .collect())
    }

    /// Test names of `project` (its name prefix, like `toi`), or of every
    /// project for `all`
    pub fn get_all_list(&self, project: &str) -> Result<Vec<String>> {
        let re = if project == "all" {
            (*ANY_PROJECT_RE).clone()
        } else {
            let pattern = format!(r"^test_{}_[a-z_]+?\d{{4}}$", regex::escape(project));
            Regex::new(&pattern).map_err(|e| Error::Internal(e.to_string()))?
        };

        Ok(self
            .suites()
            .flat_map(|(_, _, s)| s.tests.iter())
            .filter(|t| re.is_match(&t.name))
            .map(|t| t.name.clone())
            .collect())
    }

    /// Metadata records for `names`
    ///
    /// A test whose `@note` is a mapping yields one record per entry, the key
    /// extending the name and the value extending the script id.
    pub fn get_test_metadata(&self, names: &[String]) -> Result<Vec<Value>> {
        let mut records = Vec::new();

        for name in names {
            let short = name.replace("test_", "");
            let full = format!("test_{}", short);
            let found = self.find_tc(&full).ok_or_else(|| Error::TestNotFound(full.clone()))?;
            let doc = found.doc();

            // only a `{key: value, ...}` note lists variants; prose stays prose
            let variants = doc
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| n.starts_with('{') && n.ends_with('}'))
                .and_then(|n| serde_yaml::from_str::<IndexMap<String, String>>(n).ok())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| IndexMap::from([(String::new(), String::new())]));

            let steps: Vec<String> = found
                .case
                .steps
                .iter()
                .map(|s| capitalize(&s.summary().replace('"', "")))
                .collect();

            for (key, val) in variants {
                let mut record = match serde_json::to_value(&doc)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                record.insert("name".into(), json!(suffixed(&doc.title, &key)));
                record.insert("script_id".into(), json!(suffixed(&short, &val)));
                record.insert("steps".into(), json!(steps));
                if doc.priority.is_none() {
                    record.insert("priority".into(), json!(3));
                }
                record.insert("result".into(), json!(doc.description.replace('"', "")));
                records.push(Value::Object(record));
            }
        }

        Ok(records)
    }
}

fn suffixed(base: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{} {}", base, suffix)
    }
}

fn capitalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = r#"
tags: [login]
tests:
  - name: test_toi_login_0001
    doc: |
      Valid login
      @test User reaches the secure area
    steps:
      - action: go_to
        target: The Internet
      - action: verify
        target: Authenticated
        description: Secure area is "shown"
  - name: test_toi_login_0002
    doc: |
      Two variants
      @test Bad logins are refused
      @note {bad user: A, bad password: B}
  - name: helper_not_a_test
"#;

    const FORMS: &str = r#"
tests:
  - name: test_ti_forms_0001
    doc: Forgot password
"#;

    fn catalog() -> (tempfile::TempDir, TestCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("test_cases.yaml"),
            "the_other_internet: [toi_login, toi_missing]\nthe_internet: [ti_forms]\n",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("cases/the_other_internet")).unwrap();
        std::fs::create_dir_all(root.join("cases/the_internet")).unwrap();
        std::fs::write(root.join("cases/the_other_internet/toi_login.yaml"), LOGIN).unwrap();
        std::fs::write(root.join("cases/the_internet/ti_forms.yaml"), FORMS).unwrap();

        let catalog =
            TestCatalog::from_paths(&root.join("test_cases.yaml"), &root.join("cases")).unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_find_tc() {
        let (_dir, catalog) = catalog();
        let found = catalog.find_tc("test_ti_forms_0001").unwrap();
        assert_eq!(found.project, "the_internet");
        assert_eq!(found.suite, "ti_forms");
        assert_eq!(found.doc().title, "Forgot password");

        let found = catalog.find_tc("test_toi_login_0002").unwrap();
        assert_eq!(found.suite_tags, vec!["login"]);
        assert!(catalog.find_tc("test_toi_login_0009").is_none());
    }

    #[test]
    fn test_get_tc_list() {
        let (_dir, catalog) = catalog();
        assert_eq!(
            catalog.get_tc_list("toi_login").unwrap(),
            vec!["test_toi_login_0001", "test_toi_login_0002"]
        );
        assert!(matches!(
            catalog.get_tc_list("nope"),
            Err(Error::SuiteNotFound(name)) if name == "nope"
        ));
        // listed in the index but missing on disk
        assert!(catalog.get_tc_list("toi_missing").is_err());
    }

    #[test]
    fn test_get_all_list() {
        let (_dir, catalog) = catalog();
        assert_eq!(catalog.get_all_list("ti").unwrap(), vec!["test_ti_forms_0001"]);
        assert_eq!(catalog.get_all_list("all").unwrap().len(), 3);
        assert!(catalog.get_all_list("the_internet").unwrap().is_empty());
    }

    #[test]
    fn test_metadata() {
        let (_dir, catalog) = catalog();
        let records = catalog
            .get_test_metadata(&["toi_login_0001".to_string(), "test_toi_login_0002".to_string()])
            .unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first["name"], "Valid login");
        assert_eq!(first["script_id"], "toi_login_0001");
        assert_eq!(first["priority"], 3);
        assert_eq!(first["result"], "User reaches the secure area");
        assert_eq!(first["steps"], json!(["Go_to the internet", "Secure area is shown"]));

        assert_eq!(records[1]["name"], "Two variants bad user");
        assert_eq!(records[1]["script_id"], "toi_login_0002 A");
        assert_eq!(records[2]["script_id"], "toi_login_0002 B");

        assert!(catalog.get_test_metadata(&["toi_login_0042".to_string()]).is_err());
    }

    #[test]
    fn test_prose_note_is_not_a_variant_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.yaml"), "p: [s]\n").unwrap();
        std::fs::create_dir_all(dir.path().join("p")).unwrap();
        std::fs::write(
            dir.path().join("p/s.yaml"),
            "tests:\n  - name: test_p_s_0001\n    doc: |\n      Title\n      @note see bug: 1234\n",
        )
        .unwrap();
        let catalog = TestCatalog::from_paths(&dir.path().join("index.yaml"), dir.path()).unwrap();

        let records = catalog.get_test_metadata(&["p_s_0001".to_string()]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "Title");
        assert_eq!(records[0]["script_id"], "p_s_0001");
        assert_eq!(records[0]["note"], "see bug: 1234");
    }

    #[test]
    fn test_broken_suite_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.yaml"), "p: [broken]\n").unwrap();
        std::fs::create_dir_all(dir.path().join("p")).unwrap();
        std::fs::write(dir.path().join("p/broken.yaml"), "tests: {not: [a, list\n").unwrap();
        assert!(TestCatalog::from_paths(&dir.path().join("index.yaml"), dir.path()).is_err());
    }
}

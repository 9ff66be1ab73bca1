//! Environment scoped test data
//!
//! Every `*.yaml` file below the test-data directory carries a `test_data`
//! mapping with an `environment` key. The mappings whose environment matches
//! the run are merged into one [`TestData`], later files overwriting earlier
//! keys in walk order.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::common::{Error, Result};

/// Merged test data for one environment
///
/// Lookups of missing keys give `None` instead of failing, so a suite can
/// probe for optional values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestData {
    values: Map<String, Value>,
}

#[derive(Deserialize)]
struct FixtureFile {
    #[serde(default)]
    test_data: Option<Map<String, Value>>,
}

impl TestData {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Merge another mapping in, its keys win
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key, value);
        }
    }

    /// Replace `$name` references with test-data values
    ///
    /// A string that is exactly `$name` becomes the value stored under
    /// `name` (or null when absent); `$$` escapes a literal dollar. Arrays and
    /// mappings are resolved recursively.
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                if let Some(literal) = s.strip_prefix("$$") {
                    Value::String(format!("${}", literal))
                } else if let Some(key) = s.strip_prefix('$') {
                    self.get(key).cloned().unwrap_or(Value::Null)
                } else {
                    value.clone()
                }
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Load and merge the test data for `environment`
///
/// Walks `directory` recursively in file-name order, skipping files whose
/// name is in `exclusion`.
pub fn map_yaml(directory: &Path, exclusion: &[String], environment: &str) -> Result<TestData> {
    let mut test_data = TestData::default();

    for entry in WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(".yaml") || exclusion.iter().any(|x| x.as_str() == file_name) {
            continue;
        }

        let path = entry.path();
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let fixture: FixtureFile =
            serde_yaml::from_str(&content).map_err(|e| Error::fixture(path, e))?;

        let Some(values) = fixture.test_data else {
            tracing::debug!("No test_data section in {}", path.display());
            continue;
        };

        if values.get("environment").and_then(Value::as_str) == Some(environment) {
            tracing::debug!("Merging test data from {}", path.display());
            test_data.merge(values);
        }
    }

    tracing::info!("Loaded {} configs", test_data.len());
    Ok(test_data)
}

//! Failure message catalog
//!
//! Suites assert with short codes like `GOTO_0001`. The catalog files in the
//! error-code directory map a code family (`goto`) to a list of messages, and
//! the number after the underscore picks the message.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::common::{Error, Result};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

/// Messages keyed by lowercase code family
#[derive(Debug, Clone, Default)]
pub struct ErrorCatalog {
    families: BTreeMap<String, Vec<String>>,
}

impl ErrorCatalog {
    /// Load every `*.yaml` file directly inside `directory`
    ///
    /// A missing directory gives an empty catalog.
    pub fn load(directory: &Path, exclusion: &[String]) -> Result<Self> {
        let mut catalog = Self::default();
        if !directory.is_dir() {
            tracing::debug!("No error code directory at {}", directory.display());
            return Ok(catalog);
        }

        let mut files: Vec<_> = std::fs::read_dir(directory)
            .map_err(|e| Error::file_read(directory, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                let name = p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                name.ends_with("yaml") && !exclusion.iter().any(|x| x.as_str() == name)
            })
            .collect();
        files.sort();

        for path in files {
            let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
            let file: CatalogFile =
                serde_yaml::from_str(&content).map_err(|e| Error::fixture(&path, e))?;
            for (family, messages) in file.errors {
                catalog.families.insert(family.to_lowercase(), messages);
            }
        }

        Ok(catalog)
    }

    /// Build a catalog from in-memory families
    pub fn from_families(families: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            families: families
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }

    /// Translate a code into its message
    ///
    /// Anything that is not a single word, names no known family, or points
    /// past the end of the family's list is returned unchanged.
    pub fn message(&self, msg: &str) -> String {
        if msg.split_whitespace().count() != 1 {
            return msg.to_string();
        }

        let lower = msg.to_lowercase();
        for (family, messages) in &self.families {
            if !lower.contains(family.as_str()) {
                continue;
            }
            let index = msg.split('_').nth(1).and_then(|n| n.parse::<usize>().ok());
            if let Some(text) = index.and_then(|i| messages.get(i)) {
                return text.clone();
            }
        }
        msg.to_string()
    }
}

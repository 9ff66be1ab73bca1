//! Configuration file handling
//!
//! The harness config is a YAML (or TOML) file holding directory locations,
//! the target environment and browser settings. Keys the harness does not know
//! about are kept in a free-form settings map so suites can stash their own
//! values and read them back later in the run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::paths;
use super::{Error, Result};

/// Name of the config file searched for when none is given
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Root directory the harness runs from (defaults to the current dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub living_dir: Option<PathBuf>,

    /// Directory walked for test-data fixtures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data_dir: Option<PathBuf>,

    /// Comma separated file names skipped while loading test data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data_exclusion: Option<String>,

    /// Directory of error-code catalogs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code_dir: Option<PathBuf>,

    /// Comma separated file names skipped while loading error codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code_exclusion: Option<String>,

    /// Directory of javascript snippets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js_snippet_dir: Option<PathBuf>,

    /// Test index mapping projects to suites
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_file: Option<PathBuf>,

    /// Directory holding `<project>/<suite>.yaml` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_dir: Option<PathBuf>,

    /// Where logs, screenshots and reports are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Environment the run targets (qa, dc1, dev2, ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Agent name prepended to the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Console log level, 0 (debug) to 4 (critical)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<u8>,

    /// Browser used when none is given on the command line
    #[serde(default = "default_browser")]
    pub browser: String,

    /// Device profile (iphone, ipad, ipod, android)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    /// Version of the product under test, compared against `@version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_version: Option<String>,

    /// Base URL of the bug tracker used to build bug links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug_repo: Option<String>,

    /// Fail a verb when the page reports javascript errors
    #[serde(default)]
    pub raise_on_js_error: bool,

    /// Window position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_y: Option<u32>,

    /// WebDriver connection settings
    #[serde(default)]
    pub webdriver: WebDriverConfig,

    /// Timeout and delay settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Any other keys found in the file
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_yaml::Value>,

    /// File this config was loaded from
    #[serde(skip)]
    pub path: Option<PathBuf>,

    /// `living_dir` came from the working directory, not the file
    #[serde(skip)]
    pub living_dir_defaulted: bool,
}

/// WebDriver connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebDriverConfig {
    /// URL of a running WebDriver server
    #[serde(default = "default_webdriver_url")]
    pub url: String,

    /// Spawn geckodriver/chromedriver instead of connecting to `url`
    #[serde(default)]
    pub spawn: bool,

    /// Port used for a spawned driver service
    #[serde(default = "default_webdriver_port")]
    pub port: u16,

    /// Seconds to wait for a spawned service to report ready
    #[serde(default = "default_service_ready")]
    pub ready_timeout_secs: u64,

    /// Run the browser without a visible window
    #[serde(default)]
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            spawn: false,
            port: default_webdriver_port(),
            ready_timeout_secs: default_service_ready(),
            headless: false,
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}
fn default_webdriver_port() -> u16 {
    4444
}
fn default_service_ready() -> u64 {
    20
}

/// Timeout and delay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timeouts {
    /// Default wait for element lookups, in seconds
    #[serde(default = "default_element_wait")]
    pub element_wait_secs: f64,

    /// Interval between element lookups while waiting, in milliseconds
    #[serde(default = "default_element_poll")]
    pub element_poll_ms: u64,

    /// Pause after a successful go_to, in milliseconds
    #[serde(default = "default_go_to_settle")]
    pub go_to_settle_ms: u64,

    /// Pause after a successful dialog, in milliseconds
    #[serde(default = "default_settle")]
    pub dialog_settle_ms: u64,

    /// Pause after a successful verify, in milliseconds
    #[serde(default = "default_settle")]
    pub verify_settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_wait_secs: default_element_wait(),
            element_poll_ms: default_element_poll(),
            go_to_settle_ms: default_go_to_settle(),
            dialog_settle_ms: default_settle(),
            verify_settle_ms: default_settle(),
        }
    }
}

fn default_element_wait() -> f64 {
    10.0
}
fn default_element_poll() -> u64 {
    250
}
fn default_go_to_settle() -> u64 {
    1000
}
fn default_settle() -> u64 {
    500
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_environment() -> String {
    "qa".to_string()
}
fn default_browser() -> String {
    "firefox".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            living_dir: None,
            test_data_dir: None,
            test_data_exclusion: None,
            error_code_dir: None,
            error_code_exclusion: None,
            js_snippet_dir: None,
            test_case_file: None,
            test_case_dir: None,
            output_dir: default_output_dir(),
            environment: default_environment(),
            agent: None,
            log_level: None,
            browser: default_browser(),
            device_type: None,
            driver_version: None,
            bug_repo: None,
            raise_on_js_error: false,
            window_x: None,
            window_y: None,
            webdriver: WebDriverConfig::default(),
            timeouts: Timeouts::default(),
            settings: BTreeMap::new(),
            path: None,
            living_dir_defaulted: false,
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// `.toml` files are parsed as TOML, anything else as YAML. Directory
    /// defaults are filled in after parsing.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;

        let mut config: Config = if is_toml(path) {
            toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))?
        };

        config.path = Some(path.to_path_buf());
        config.init_defaults()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Find the config file to use
    ///
    /// An explicit path always wins. Otherwise looks for `config.yaml` in the
    /// current directory, next to the executable, then in the user config dir.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let beside = dir.join(CONFIG_FILE_NAME);
            if beside.is_file() {
                return Some(beside);
            }
        }

        paths::config_path().filter(|p| p.is_file())
    }

    /// Fill in directory defaults relative to `living_dir`
    pub fn init_defaults(&mut self) -> Result<()> {
        if self.living_dir.is_none() {
            self.living_dir = Some(std::env::current_dir()?);
            self.living_dir_defaulted = true;
        }
        let living = self.living_dir();

        let assets = living.join("assets");
        self.test_data_dir.get_or_insert_with(|| assets.join("test_data"));
        self.error_code_dir.get_or_insert_with(|| assets.join("error_codes"));
        self.js_snippet_dir.get_or_insert_with(|| assets.join("js_snippets"));
        self.test_case_file.get_or_insert_with(|| living.join("test_cases.yaml"));
        self.test_case_dir.get_or_insert_with(|| living.join("test_cases"));
        self.test_data_exclusion.get_or_insert_with(String::new);
        self.error_code_exclusion.get_or_insert_with(String::new);

        if self.output_dir.is_relative() {
            self.output_dir = living.join(&self.output_dir);
        }
        self.environment = self.environment.to_lowercase();
        Ok(())
    }

    pub fn living_dir(&self) -> PathBuf {
        self.living_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn test_data_dir(&self) -> PathBuf {
        self.test_data_dir
            .clone()
            .unwrap_or_else(|| self.living_dir().join("assets").join("test_data"))
    }

    pub fn error_code_dir(&self) -> PathBuf {
        self.error_code_dir
            .clone()
            .unwrap_or_else(|| self.living_dir().join("assets").join("error_codes"))
    }

    pub fn js_snippet_dir(&self) -> PathBuf {
        self.js_snippet_dir
            .clone()
            .unwrap_or_else(|| self.living_dir().join("assets").join("js_snippets"))
    }

    pub fn test_case_file(&self) -> PathBuf {
        self.test_case_file
            .clone()
            .unwrap_or_else(|| self.living_dir().join("test_cases.yaml"))
    }

    pub fn test_case_dir(&self) -> PathBuf {
        self.test_case_dir
            .clone()
            .unwrap_or_else(|| self.living_dir().join("test_cases"))
    }

    /// Test-data file names to skip
    pub fn test_data_exclusions(&self) -> Vec<String> {
        split_list(self.test_data_exclusion.as_deref())
    }

    /// Error-code file names to skip
    pub fn error_code_exclusions(&self) -> Vec<String> {
        split_list(self.error_code_exclusion.as_deref())
    }

    /// Look up a free-form setting
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.settings.get(key)
    }

    /// Look up a free-form setting as a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    /// Store a free-form setting, returning the previous value
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_yaml::Value>,
    ) -> Option<serde_yaml::Value> {
        self.settings.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_yaml::Value> {
        self.settings.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.settings.keys()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Re-read the file this config came from
    pub fn reload(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::Config("Config was not loaded from a file".to_string()))?;
        *self = Self::load(&path)?;
        Ok(())
    }

    /// Write the current values back to the file this config came from
    pub fn dump(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| Error::Config("Config was not loaded from a file".to_string()))?;
        let stored = self.without_defaults();
        let content = if is_toml(path) {
            toml::to_string_pretty(&stored).map_err(|e| Error::Config(e.to_string()))?
        } else {
            serde_yaml::to_string(&stored)?
        };
        std::fs::write(path, content).map_err(|e| Error::file_write(path, e))
    }
}

impl Config {
    /// Copy with the values `init_defaults` filled in taken out again
    fn without_defaults(&self) -> Self {
        let mut config = self.clone();
        let living = self.living_dir();
        let assets = living.join("assets");

        clear_if(&mut config.test_data_dir, &assets.join("test_data"));
        clear_if(&mut config.error_code_dir, &assets.join("error_codes"));
        clear_if(&mut config.js_snippet_dir, &assets.join("js_snippets"));
        clear_if(&mut config.test_case_file, &living.join("test_cases.yaml"));
        clear_if(&mut config.test_case_dir, &living.join("test_cases"));
        for exclusion in [&mut config.test_data_exclusion, &mut config.error_code_exclusion] {
            if exclusion.as_deref() == Some("") {
                *exclusion = None;
            }
        }
        if config.output_dir == living.join(default_output_dir()) {
            config.output_dir = default_output_dir();
        }
        if self.living_dir_defaulted {
            config.living_dir = None;
        }
        config
    }
}

fn clear_if(value: &mut Option<PathBuf>, default: &Path) {
    if value.as_deref() == Some(default) {
        *value = None;
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

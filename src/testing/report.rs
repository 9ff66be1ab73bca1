//! JSON run report
//!
//! One `Test_Results_<run_id>.json` per run: a header describing the host,
//! then a `test_cases` array that grows by one record per finished test.
//! The file is rewritten on every append with sorted keys and a four space
//! indent.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::common::{Error, Result};

/// Where the run happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub ip: String,
    pub dist: String,
    pub bit: String,
}

impl HostInfo {
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        let info = os_info::get();

        let os = info.os_type().to_string();

        Self {
            ip: host_ip(&hostname).to_string(),
            dist: format!("{} {}", os, info.version()),
            bit: info
                .architecture()
                .map(str::to_string)
                .unwrap_or_else(|| info.bitness().to_string()),
            os,
            hostname,
        }
    }
}

fn host_ip(hostname: &str) -> IpAddr {
    (hostname, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .map(|a| a.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Bug reference attached to a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BugRef {
    pub bug_text: String,
    pub bug_link: String,
}

impl BugRef {
    /// Link `bug` below `bug_repo`, or below `http://localhost` without one
    pub fn new(bug: &str, bug_repo: Option<&str>) -> Self {
        let repo = bug_repo.unwrap_or("http://localhost").trim_end_matches('/');
        Self {
            bug_text: bug.to_string(),
            bug_link: format!("{}/{}", repo, bug),
        }
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub name: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug: Option<BugRef>,
    /// Whole seconds
    pub duration: u64,
    pub result: String,
}

/// Serializes a JSON value with every object's keys in sorted order
struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Sorted<'_>> =
                    map.iter().map(|(k, v)| (k, Sorted(v))).collect();
                sorted.serialize(serializer)
            }
            Value::Array(items) => {
                let items: Vec<Sorted<'_>> = items.iter().map(Sorted).collect();
                items.serialize(serializer)
            }
            other => other.serialize(serializer),
        }
    }
}

fn to_pretty(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    Sorted(value).serialize(&mut ser)?;
    Ok(out)
}

/// Handle to the report file of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    path: PathBuf,
}

impl RunReport {
    pub fn file_name(run_id: &str) -> String {
        format!("Test_Results_{}.json", run_id)
    }

    /// Write a fresh report header into `dir`
    pub fn create(dir: &Path, run_id: &str, browser: &str, host: &HostInfo) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::file_write(dir, e))?;
        let report = Self {
            path: dir.join(Self::file_name(run_id)),
        };
        let header = json!({
            "name": host.hostname,
            "run_id": run_id,
            "os": host.os,
            "ip": host.ip,
            "browser": browser,
            "dist": host.dist,
            "bit": host.bit,
            "test_cases": [],
        });
        report.write(&header)?;
        tracing::debug!("Report header written to {}", report.path.display());
        Ok(report)
    }

    /// Attach to an existing report
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Value> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| Error::file_read(&self.path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Re-read the report and rewrite it with `record` appended
    pub fn append(&self, record: &TestRecord) -> Result<()> {
        tracing::debug!("Output File Path: {}", self.path.display());
        let mut report = self.read()?;
        let cases = report
            .as_object_mut()
            .map(|o| o.entry("test_cases").or_insert_with(|| json!([])))
            .and_then(Value::as_array_mut)
            .ok_or_else(|| {
                Error::Internal(format!("{} has no test_cases array", self.path.display()))
            })?;
        cases.push(serde_json::to_value(record)?);
        self.write(&report)
    }

    fn write(&self, value: &Value) -> Result<()> {
        let bytes = to_pretty(value)?;
        std::fs::write(&self.path, bytes).map_err(|e| Error::file_write(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostInfo {
        HostInfo {
            hostname: "runner".into(),
            os: "Linux".into(),
            ip: "10.0.0.2".into(),
            dist: "Ubuntu 22.04".into(),
            bit: "x86_64".into(),
        }
    }

    #[test]
    fn test_header_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::create(dir.path(), "toi_1a2b", "firefox", &host()).unwrap();
        assert!(report.path().ends_with("Test_Results_toi_1a2b.json"));

        report
            .append(&TestRecord {
                name: "test_toi_login_0001".into(),
                title: "Valid login".into(),
                description: "User reaches the secure area".into(),
                bug: Some(BugRef::new("BUG-7", Some("https://bugs.example.com/"))),
                duration: 4,
                result: "passed".into(),
            })
            .unwrap();

        let value = report.read().unwrap();
        assert_eq!(value["name"], "runner");
        assert_eq!(value["browser"], "firefox");
        let cases = value["test_cases"].as_array().unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0]["bug"]["bug_link"], "https://bugs.example.com/BUG-7");
        assert_eq!(cases[0]["duration"], 4);
    }

    #[test]
    fn test_sorted_four_space_output() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::create(dir.path(), "x", "chrome", &host()).unwrap();
        let text = std::fs::read_to_string(report.path()).unwrap();

        assert!(text.starts_with("{\n    \"bit\": \"x86_64\",\n    \"browser\": \"chrome\","));
        let keys: Vec<usize> = ["\"bit\"", "\"dist\"", "\"ip\"", "\"name\"", "\"test_cases\""]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bug_without_repo() {
        let bug = BugRef::new("42", None);
        assert_eq!(bug.bug_link, "http://localhost/42");
    }
}

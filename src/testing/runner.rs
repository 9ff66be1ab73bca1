//! Test runner implementation
//!
//! Runs a list of test names one after the other against a single site
//! core, giving every test its own log file and tallying the failures.

use std::path::PathBuf;

use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::Instrument;

use super::discovery::TestCatalog;
use super::report::RunReport;
use super::template::{Outcome, TestTemplate};
use crate::common::logging::TestLogSink;
use crate::common::{paths, Error};
use crate::data::ErrorCatalog;
use crate::framework::TiCore;

static PROJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\w+?)_(\w+?)_(?:.+)").expect("valid regex"));

/// Project prefix of a test name, `toi` for `test_toi_login_0001`
pub fn project_of(test_name: &str) -> Option<&str> {
    PROJECT_RE
        .captures(test_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Where each test's log file goes
struct TestLogs {
    sink: TestLogSink,
    dir: PathBuf,
}

/// Runs tests and counts failures
pub struct TestRunner {
    ti: TiCore,
    catalog: TestCatalog,
    errors: ErrorCatalog,
    report: Option<RunReport>,
    logs: Option<TestLogs>,
    run_id: String,
}

impl TestRunner {
    pub fn new(ti: TiCore, catalog: TestCatalog, errors: ErrorCatalog) -> Self {
        Self {
            ti,
            catalog,
            errors,
            report: None,
            logs: None,
            run_id: String::new(),
        }
    }

    /// Append results to `report`
    pub fn with_report(mut self, report: RunReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Write `LOG_<test> <stamp>.log` files into `dir` through `sink`
    pub fn with_test_logs(mut self, sink: TestLogSink, dir: impl Into<PathBuf>) -> Self {
        self.logs = Some(TestLogs {
            sink,
            dir: dir.into(),
        });
        self
    }

    /// Base run id; each test runs as `<project>_<run_id>`
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn ti(&self) -> &TiCore {
        &self.ti
    }

    pub fn ti_mut(&mut self) -> &mut TiCore {
        &mut self.ti
    }

    /// Run every test in `tests`, returning how many failed
    ///
    /// Names may leave off the `test_` prefix. A name that matches no test
    /// case counts as a failure.
    pub async fn run_tests(&mut self, tests: &[String]) -> usize {
        let total = tests.len();
        let mut failures: Vec<String> = Vec::new();

        for (i, test) in tests.iter().enumerate() {
            self.open_log(test);

            let name = if test.starts_with("test_") {
                test.clone()
            } else {
                format!("test_{}", test)
            };
            let run_id = match project_of(&name) {
                Some(project) => format!("{}_{}", project, self.run_id),
                None => self.run_id.clone(),
            };

            let span = tracing::info_span!("test", run_id = %run_id, name = %name);
            let outcome = self.run_one(&name).instrument(span).await;

            let label = match outcome {
                Outcome::Passed => "Passed",
                Outcome::Failed => "Failed",
                Outcome::Skipped => "Skipped",
            };
            tracing::info!("TEST {}/{}: {}: {}", i + 1, total, name, label);
            match outcome {
                Outcome::Passed => println!("  {} {}", "✓".green(), name),
                Outcome::Skipped => println!("  {} {} {}", "-".yellow(), name, "(skipped)".dimmed()),
                Outcome::Failed => {
                    println!("  {} {}", "✗".red(), name);
                    failures.push(name);
                }
            }

            if let Some(logs) = &self.logs {
                logs.sink.close();
            }
        }

        tracing::info!("{}", failure_summary(&failures));
        failures.len()
    }

    async fn run_one(&mut self, name: &str) -> Outcome {
        let Some(found) = self.catalog.find_tc(name) else {
            tracing::error!("{}", Error::TestNotFound(name.to_string()));
            return Outcome::Failed;
        };
        tracing::debug!("Found {} in {}/{}", name, found.project, found.suite);

        TestTemplate::new(&mut self.ti, &self.errors, self.report.as_ref())
            .run(&found)
            .await
    }

    fn open_log(&self, test: &str) {
        let Some(logs) = &self.logs else {
            return;
        };
        let file = format!("LOG_{} {}.log", test, paths::time_stamp(chrono::Local::now()));
        let path = logs.dir.join(file);
        if let Err(e) = logs.sink.open(&path) {
            tracing::warn!("Could not open test log {}: {}", path.display(), e);
        }
    }
}

fn failure_summary(failures: &[String]) -> String {
    if failures.is_empty() {
        format!("TOTAL FAILURES: {}", failures.len())
    } else {
        format!("TOTAL FAILURES: {} ({})", failures.len(), failures.join(", "))
    }
}

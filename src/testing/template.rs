//! Running a single test case
//!
//! Lifecycle of one case:
//!
//! 1. setup: start a browser, check the doc gating, start the timer
//! 2. body: run the steps, asserting each verb outcome
//! 3. teardown: stop the timer, append to the report, close the browser
//!
//! Teardown problems are logged and never change the outcome.

use serde_json::Value;

use super::config::{StepAction, TestStep};
use super::discovery::FoundTest;
use super::doc::TestDoc;
use super::report::{BugRef, RunReport, TestRecord};
use crate::common::{Error, Result};
use crate::data::{ErrorCatalog, TestData};
use crate::framework::core::{Core, WriteLevel};
use crate::framework::verb::{Keywords, DATA_KEYWORD};
use crate::framework::TiCore;

/// Result of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }

    pub fn is_failure(self) -> bool {
        self == Outcome::Failed
    }
}

/// Fail unless `expr` holds
///
/// `msg` may be an error-catalog code; `data` is appended to the message.
pub fn assert_true(
    catalog: &ErrorCatalog,
    expr: bool,
    msg: &str,
    data: Option<&Value>,
) -> Result<()> {
    if expr {
        return Ok(());
    }
    let mut message = catalog.message(msg);
    if let Some(data) = data {
        message.push_str(&format!(" WITH DATA {}", data));
    }
    Err(Error::Assertion(message))
}

/// Fail if `expr` holds
pub fn assert_false(
    catalog: &ErrorCatalog,
    expr: bool,
    msg: &str,
    data: Option<&Value>,
) -> Result<()> {
    assert_true(catalog, !expr, msg, data)
}

/// Runs test cases against one site core
pub struct TestTemplate<'a> {
    ti: &'a mut TiCore,
    catalog: &'a ErrorCatalog,
    report: Option<&'a RunReport>,
}

impl<'a> TestTemplate<'a> {
    pub fn new(ti: &'a mut TiCore, catalog: &'a ErrorCatalog, report: Option<&'a RunReport>) -> Self {
        Self {
            ti,
            catalog,
            report,
        }
    }

    /// Run `test` through setup, body and teardown
    pub async fn run(&mut self, test: &FoundTest) -> Outcome {
        let doc = test.doc();
        log_doc(&doc);

        let outcome = match self.setup(&doc).await {
            Ok(Some(reason)) => {
                Core::write(format!("{}\n{}", "_".repeat(40), reason), WriteLevel::Error);
                if let Err(e) = self.ti.core_mut().close_driver().await {
                    tracing::warn!("Failed to close the driver: {}", e);
                }
                Outcome::Skipped
            }
            Ok(None) => match self.body(test).await {
                Ok(()) => Outcome::Passed,
                Err(e) => {
                    self.record_failure(&test.case.name, &e).await;
                    Outcome::Failed
                }
            },
            Err(e) => {
                Core::write(format!("Test setup failed: {}", e), WriteLevel::Error);
                Outcome::Failed
            }
        };

        self.teardown(&doc, outcome).await;
        outcome
    }

    /// Start the browser and gate on the doc block
    ///
    /// Returns the skip reason when the test must not run.
    async fn setup(&mut self, doc: &TestDoc) -> Result<Option<String>> {
        let core = self.ti.core_mut();
        core.get_driver(None, None).await?;

        let config = core.config();
        if let Some(reason) = doc.ok_to_run(config.driver_version.as_deref(), &config.environment) {
            return Ok(Some(reason));
        }

        core.timer_start();
        Ok(None)
    }

    async fn body(&mut self, test: &FoundTest) -> Result<()> {
        let data = self.ti.core_mut().get_test_data(None)?;

        for (i, step) in test.case.steps.iter().enumerate() {
            tracing::info!("Step {}: {}", i + 1, step.summary());
            self.run_step(step, &data).await?;
        }
        Ok(())
    }

    async fn run_step(&mut self, step: &TestStep, data: &TestData) -> Result<()> {
        let args: Vec<Value> = step.args.iter().map(|v| data.resolve(v)).collect();
        let mut kwargs: Keywords = step
            .kwargs
            .iter()
            .map(|(k, v)| (k.clone(), data.resolve(v)))
            .collect();
        let step_data = step.data.as_ref().map(|v| data.resolve(v));
        if let Some(value) = &step_data {
            kwargs.insert(DATA_KEYWORD.to_string(), value.clone());
        }

        let target = step.target.as_deref();
        let outcome = match (step.action, target) {
            (StepAction::GoTo, Some(location)) => {
                self.ti
                    .go_to(location, step.menu.as_deref(), &args, &kwargs)
                    .await
            }
            (StepAction::Dialog, Some(dialog)) => self.ti.dialog(dialog, &args, &kwargs).await,
            (StepAction::Verify, item) => self.ti.verify(item, &args, &kwargs).await,
            (action, None) => {
                tracing::error!("{} step has no target", action.name());
                false
            }
        };

        let default_msg = format!("Failed to {}", step.summary());
        let msg = step.message.as_deref().unwrap_or(&default_msg);
        if step.expect {
            assert_true(self.catalog, outcome, msg, step_data.as_ref())
        } else {
            assert_false(self.catalog, outcome, msg, step_data.as_ref())
        }
    }

    async fn record_failure(&mut self, name: &str, error: &Error) {
        Core::write(error, WriteLevel::Error);
        let shot = name.strip_prefix("test_").unwrap_or(name);
        let core = self.ti.core_mut();
        if core.has_driver() {
            match core.take_screenshot(Some(shot)).await {
                Ok(path) => tracing::info!("Screenshot saved to {}", path.display()),
                Err(e) => tracing::warn!("Failed to take a screenshot: {}", e),
            }
        }
    }

    async fn teardown(&mut self, doc: &TestDoc, outcome: Outcome) {
        let core = self.ti.core_mut();
        let duration = core.timer_end();
        tracing::info!("Test {} finished in {}s: {}", doc.name, duration, outcome.as_str());

        if let Some(report) = self.report {
            let record = TestRecord {
                name: doc.name.clone(),
                title: doc.title.clone(),
                description: doc.description.clone(),
                bug: (!doc.bug.is_empty())
                    .then(|| BugRef::new(&doc.bug, core.config().bug_repo.as_deref())),
                duration,
                result: outcome.as_str().to_string(),
            };
            if let Err(e) = report.append(&record) {
                tracing::error!("Failed to write the test result: {}", e);
            }
        }

        if let Err(e) = core.close_driver().await {
            tracing::error!("Failed to close the driver: {}", e);
        }
    }
}

fn log_doc(doc: &TestDoc) {
    tracing::info!("NAME: {}", doc.name);
    tracing::info!("TITLE: {}", doc.title);
    tracing::info!("TEST: {}", doc.description);
    tracing::info!("BUG: {}", doc.bug);
}

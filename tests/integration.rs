//! End-to-end integration tests for the SLAP harness
//!
//! These tests drive the verbs, the test template and the runner against a
//! scripted in-memory copy of the-internet login and password pages, so no
//! WebDriver server is needed. The last tests run the `slap` binary itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use slap::common::config::{Config, Timeouts};
use slap::data::ErrorCatalog;
use slap::framework::browser::{Browser, BrowserLauncher, BrowserType, DeviceType, ElementLocator};
use slap::framework::verb::Keywords;
use slap::framework::{Core, TiCore};
use slap::testing::{HostInfo, RunReport, TestCatalog, TestRunner};
use slap::{Error, Result};

const BASE: &str = "http://the-internet.herokuapp.com";
const SUBMIT: &str = "//button[@class='radius']";

/// What the scripted site is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Blank,
    Home,
    Login,
    LoginFailed,
    Secure,
    Forgot,
    EmailSent,
    ServerError,
}

impl Page {
    fn elements(self) -> &'static [&'static str] {
        match self {
            Page::Blank => &[],
            Page::Home => &[
                "//h1[text()='Welcome to the-internet']",
                "//a[text()='Form Authentication']",
                "//a[text()='Forgot Password']",
            ],
            Page::Login => &["//h2[text()='Login Page']", "username", "password", SUBMIT],
            Page::LoginFailed => &[
                "//h2[text()='Login Page']",
                "username",
                "password",
                SUBMIT,
                "//div[@class='flash error' and contains(text(), 'Your username is invalid!')]",
            ],
            Page::Secure => &[
                "//h2[contains(text(), 'Secure Area')]",
                "//div[@class='flash success']",
            ],
            Page::Forgot => &["//h2[text()='Forgot Password']", "email", SUBMIT],
            Page::EmailSent => &["//div[@id='content' and contains(text(), 'been sent!')]"],
            Page::ServerError => &["//h1[contains(text(), 'Internal Server Error')]"],
        }
    }
}

/// Shared state of every session the mock launcher hands out
#[derive(Debug)]
struct Site {
    page: Page,
    url: String,
    typed: HashMap<String, String>,
    js_errors: Option<String>,
    launches: usize,
    quits: usize,
    screenshots: usize,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            page: Page::Blank,
            url: "about:blank".to_string(),
            typed: HashMap::new(),
            js_errors: None,
            launches: 0,
            quits: 0,
            screenshots: 0,
        }
    }
}

impl Site {
    fn show(&mut self, page: Page, path: &str) {
        self.page = page;
        self.url = format!("{}{}", BASE, path);
        self.typed.clear();
    }

    fn submit(&mut self) {
        match self.page {
            Page::Login | Page::LoginFailed => {
                let user = self.typed.get("username").cloned().unwrap_or_default();
                let password = self.typed.get("password").cloned().unwrap_or_default();
                if user == "tomsmith" && password == "SuperSecretPassword!" {
                    self.show(Page::Secure, "/secure");
                } else {
                    self.show(Page::LoginFailed, "/login");
                }
            }
            Page::Forgot => {
                if self.typed.get("email").map_or(true, |e| e.is_empty()) {
                    self.show(Page::ServerError, "/forgot_password");
                } else {
                    self.show(Page::EmailSent, "/email_sent");
                }
            }
            _ => {}
        }
    }
}

struct MockBrowser(Arc<Mutex<Site>>);

#[async_trait]
impl Browser for MockBrowser {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let mut site = self.0.lock().unwrap();
        if url.trim_end_matches('/') == BASE {
            site.show(Page::Home, "/");
        } else {
            site.page = Page::Blank;
            site.url = url.to_string();
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.0.lock().unwrap().url.clone())
    }

    async fn find_all(&mut self, locator: &ElementLocator) -> Result<usize> {
        let site = self.0.lock().unwrap();
        Ok(site.page.elements().contains(&locator.value.as_str()) as usize)
    }

    async fn click(&mut self, locator: &ElementLocator, _index: usize) -> Result<()> {
        let mut site = self.0.lock().unwrap();
        match locator.value.as_str() {
            "//a[text()='Form Authentication']" => site.show(Page::Login, "/login"),
            "//a[text()='Forgot Password']" => site.show(Page::Forgot, "/forgot_password"),
            SUBMIT => site.submit(),
            _ => {}
        }
        Ok(())
    }

    async fn send_keys(&mut self, locator: &ElementLocator, _index: usize, keys: &str) -> Result<()> {
        let mut site = self.0.lock().unwrap();
        site.typed
            .entry(locator.value.clone())
            .or_default()
            .push_str(keys);
        Ok(())
    }

    async fn clear(&mut self, locator: &ElementLocator, _index: usize) -> Result<()> {
        self.0.lock().unwrap().typed.remove(&locator.value);
        Ok(())
    }

    async fn text(&mut self, _locator: &ElementLocator, _index: usize) -> Result<String> {
        Ok(String::new())
    }

    async fn attribute(
        &mut self,
        _locator: &ElementLocator,
        _index: usize,
        _name: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    async fn execute(&mut self, script: &str, _args: Vec<Value>) -> Result<Value> {
        let site = self.0.lock().unwrap();
        if script.contains("JSON.stringify") {
            return Ok(json!(site.js_errors.clone().unwrap_or_else(|| "[]".to_string())));
        }
        Ok(Value::Null)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.0.lock().unwrap().screenshots += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn set_window_rect(&mut self, _x: u32, _y: u32, _w: u32, _h: u32) -> Result<()> {
        Ok(())
    }

    async fn accept_alert(&mut self) -> Result<()> {
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.0.lock().unwrap().quits += 1;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockLauncher(Arc<Mutex<Site>>);

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(
        &self,
        browser: BrowserType,
        _device: Option<DeviceType>,
    ) -> Result<Box<dyn Browser>> {
        if browser == BrowserType::Vanilla {
            return Err(Error::SessionStartFailed {
                browser: browser.name().to_string(),
                url: "mock://".to_string(),
                reason: "not installed".to_string(),
            });
        }
        let mut site = self.0.lock().unwrap();
        let fresh = Site {
            js_errors: site.js_errors.take(),
            launches: site.launches + 1,
            quits: site.quits,
            screenshots: site.screenshots,
            ..Site::default()
        };
        *site = fresh;
        Ok(Box::new(MockBrowser(Arc::clone(&self.0))))
    }
}

/// Test context with a scratch output directory
struct TestContext {
    _temp: tempfile::TempDir,
    output_dir: PathBuf,
    launcher: MockLauncher,
}

impl TestContext {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let output_dir = temp.path().join("output");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");
        Self {
            _temp: temp,
            output_dir,
            launcher: MockLauncher::default(),
        }
    }

    fn config(&self) -> Config {
        let mut config = Config {
            living_dir: Some(manifest_dir()),
            output_dir: self.output_dir.clone(),
            timeouts: Timeouts {
                element_wait_secs: 0.2,
                element_poll_ms: 10,
                go_to_settle_ms: 0,
                dialog_settle_ms: 0,
                verify_settle_ms: 0,
            },
            ..Config::default()
        };
        config.init_defaults().expect("Failed to fill config defaults");
        config
    }

    fn ti(&self, config: Config) -> TiCore {
        let core = Core::new(config, Arc::new(self.launcher.clone()))
            .with_screenshot_dir(&self.output_dir);
        TiCore::new(core)
    }

    fn site(&self) -> std::sync::MutexGuard<'_, Site> {
        self.launcher.0.lock().unwrap()
    }
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn kwargs(pairs: &[(&str, Value)]) -> Keywords {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn home() -> Keywords {
    kwargs(&[("url", json!(BASE))])
}

// ============== Verb dispatch ==============

#[tokio::test]
async fn test_login_flow_through_verbs() {
    let ctx = TestContext::new();
    let mut ti = ti_with_driver(&ctx, ctx.config()).await;

    assert!(ti.go_to("The Internet", None, &[], &home()).await);
    assert!(ti.go_to("Form Authentication", None, &[], &Keywords::new()).await);
    let login = kwargs(&[
        ("user", json!("tomsmith")),
        ("password", json!("SuperSecretPassword!")),
    ]);
    assert!(ti.dialog("Login Page", &[], &login).await);
    assert!(ti.verify(Some("Authenticated"), &[], &Keywords::new()).await);
    assert!(!ti.verify(Some("Not Authenticated"), &[], &Keywords::new()).await);
}

#[tokio::test]
async fn test_data_keyword_and_positionals() {
    let ctx = TestContext::new();
    let mut ti = ti_with_driver(&ctx, ctx.config()).await;

    // positional url
    assert!(ti.go_to("The Internet", None, &[json!(BASE)], &Keywords::new()).await);
    assert!(ti.go_to("Form Authentication", None, &[], &Keywords::new()).await);

    // data fills the params, the keyword overrides it, the positional wins
    let args = kwargs(&[
        ("data", json!({"user": "nobody", "password": "SuperSecretPassword!"})),
        ("user", json!("somebody")),
    ]);
    assert!(ti.dialog("Login Page", &[json!("tomsmith")], &args).await);
    assert!(ti.verify(Some("Authenticated"), &[], &Keywords::new()).await);
}

#[tokio::test]
async fn test_failures_are_reported_as_false() {
    let ctx = TestContext::new();
    let mut ti = ti_with_driver(&ctx, ctx.config()).await;

    // unknown verb, unknown menu entry and missing item
    assert!(!ti.go_to("Nowhere", None, &[], &Keywords::new()).await);
    assert!(!ti.go_to("The Internet", Some("Products"), &[], &home()).await);
    assert!(!ti.verify(None, &[], &Keywords::new()).await);

    // required argument missing
    assert!(!ti.go_to("The Internet", None, &[], &Keywords::new()).await);

    // element never shows up
    assert!(!ti.go_to("Form Authentication", None, &[], &Keywords::new()).await);
}

#[tokio::test]
async fn test_verbs_need_a_driver() {
    let ctx = TestContext::new();
    let mut ti = ctx.ti(ctx.config());
    assert!(!ti.go_to("The Internet", None, &[], &home()).await);
    assert_eq!(ctx.site().launches, 0);
}

#[tokio::test]
async fn test_js_errors_fail_the_verb() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.raise_on_js_error = true;
    let mut ti = ti_with_driver(&ctx, config).await;

    assert!(ti.go_to("The Internet", None, &[], &home()).await);

    ctx.site().js_errors =
        Some(r#"[{"msg": "x is undefined", "url": "app.js", "linenumber": 12}]"#.to_string());
    assert!(!ti.go_to("Form Authentication", None, &[], &Keywords::new()).await);
}

#[tokio::test]
async fn test_unreadable_js_errors_fail_the_verb() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.raise_on_js_error = true;
    config.js_snippet_dir = Some(ctx.output_dir.join("no_snippets"));
    let mut ti = ti_with_driver(&ctx, config).await;

    ctx.site().js_errors = Some(r#"[{"msg": "boom", "url": "app.js", "linenumber": 1}]"#.to_string());
    assert!(!ti.go_to("The Internet", None, &[], &home()).await);
}

#[tokio::test]
async fn test_verb_failure_with_js_errors_is_still_false() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.raise_on_js_error = true;
    let mut ti = ti_with_driver(&ctx, config).await;

    ctx.site().js_errors = Some(r#"[{"msg": "boom", "url": "app.js", "linenumber": 1}]"#.to_string());
    // nothing on the blank page: the timeout, not the js errors, fails the verb
    assert!(!ti.go_to("Form Authentication", None, &[], &Keywords::new()).await);
}

#[tokio::test]
async fn test_get_driver_replaces_the_session() {
    let ctx = TestContext::new();
    let mut ti = ti_with_driver(&ctx, ctx.config()).await;
    ti.core_mut().get_driver(Some("chrome"), None).await.unwrap();
    assert_eq!(ctx.site().launches, 2);
    assert_eq!(ctx.site().quits, 1);

    assert!(matches!(
        ti.core_mut().get_driver(Some("lynx"), None).await,
        Err(Error::UnknownBrowser(_))
    ));
    assert!(ti.core_mut().get_driver(Some("vanilla"), None).await.is_err());

    ti.core_mut().close_driver().await.unwrap();
    assert!(!ti.core().has_driver());
}

#[tokio::test]
async fn test_test_data_for_environment() {
    let ctx = TestContext::new();
    let mut ti = ctx.ti(ctx.config());

    let data = ti.core_mut().get_test_data(None).unwrap();
    assert_eq!(data.get_str("user"), Some("tomsmith"));
    assert_eq!(data.get_str("url"), Some(BASE));

    let data = ti.core_mut().get_test_data(Some("prod")).unwrap();
    assert!(data.is_empty());
    assert_eq!(ti.core().config().environment, "prod");
}

async fn ti_with_driver(ctx: &TestContext, config: Config) -> TiCore {
    let mut ti = ctx.ti(config);
    ti.core_mut()
        .get_driver(None, None)
        .await
        .expect("Failed to start the mock browser");
    ti
}

// ============== Runner ==============

fn runner(ctx: &TestContext, config: Config) -> (TestRunner, RunReport) {
    let catalog = TestCatalog::load(&config).expect("Failed to load the test catalog");
    let errors = ErrorCatalog::load(&config.error_code_dir(), &config.error_code_exclusions())
        .expect("Failed to load error codes");
    let host = HostInfo {
        hostname: "runner".to_string(),
        os: "Linux".to_string(),
        ip: "127.0.0.1".to_string(),
        dist: "Linux test".to_string(),
        bit: "x86_64".to_string(),
    };
    let report = RunReport::create(&ctx.output_dir, "ab12", &config.browser, &host)
        .expect("Failed to create the report");
    let runner = TestRunner::new(ctx.ti(config), catalog, errors)
        .with_report(report.clone())
        .with_run_id("ab12");
    (runner, report)
}

fn results(report: &RunReport) -> Vec<(String, String)> {
    report.read().unwrap()["test_cases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["name"].as_str().unwrap().to_string(),
                c["result"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

fn screenshots(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("PNG_"))
        .collect()
}

#[tokio::test]
async fn test_run_login_suite() {
    let ctx = TestContext::new();
    let (mut runner, report) = runner(&ctx, ctx.config());

    let tests: Vec<String> = [
        "toi_login_0001",
        "test_toi_login_0002",
        "toi_login_0003",
        "toi_login_0004",
        "toi_login_0005",
        "toi_login_0042",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    // 0002 logs in with bad credentials, 0042 does not exist
    assert_eq!(runner.run_tests(&tests).await, 2);

    assert_eq!(
        results(&report),
        vec![
            ("test_toi_login_0001".to_string(), "passed".to_string()),
            ("test_toi_login_0002".to_string(), "failed".to_string()),
            ("test_toi_login_0003".to_string(), "passed".to_string()),
            ("test_toi_login_0004".to_string(), "passed".to_string()),
            ("test_toi_login_0005".to_string(), "passed".to_string()),
        ]
    );

    let shots = screenshots(&ctx.output_dir);
    assert_eq!(shots.len(), 1);
    assert!(shots[0].starts_with("PNG_toi_login_0002 "));

    let site = ctx.site();
    assert_eq!(site.launches, 5);
    assert_eq!(site.quits, 5);
    assert!(!runner.ti().core().has_driver());
}

#[tokio::test]
async fn test_environment_gating_skips() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.environment = "stage".to_string();
    let (mut runner, report) = runner(&ctx, config);

    let tests = vec!["ti_forms_0001".to_string()];
    assert_eq!(runner.run_tests(&tests).await, 0);

    let value = report.read().unwrap();
    let case = &value["test_cases"][0];
    assert_eq!(case["result"], "skipped");
    assert_eq!(case["duration"], 0);
    assert_eq!(ctx.site().quits, 1);
}

#[tokio::test]
async fn test_expected_failure_step_passes() {
    let ctx = TestContext::new();
    let (mut runner, report) = runner(&ctx, ctx.config());

    let tests = vec!["test_ti_forms_0001".to_string()];
    assert_eq!(runner.run_tests(&tests).await, 0);
    assert_eq!(
        results(&report),
        vec![("test_ti_forms_0001".to_string(), "passed".to_string())]
    );
}

// ============== Binary ==============

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.yaml");
    let content = format!(
        "living_dir: {}\noutput_dir: {}\nenvironment: qa\n",
        serde_json::to_string(&manifest_dir()).unwrap(),
        serde_json::to_string(&dir.join("output")).unwrap(),
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_binary_lists_tests() {
    let temp = tempfile::tempdir().unwrap();
    let config = write_config(temp.path());

    let output = Command::new(env!("CARGO_BIN_EXE_slap"))
        .args(["--config", config.to_str().unwrap(), "--all", "all", "--list"])
        .current_dir(temp.path())
        .output()
        .expect("Failed to run slap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("test_toi_login_0001"));
    assert!(stdout.contains("test_ti_forms_0001"));
    assert!(stdout.contains("Total test_cases found: \n6"));
    assert!(temp.path().join("output/current").is_dir());
}

#[test]
fn test_binary_prints_metadata() {
    let temp = tempfile::tempdir().unwrap();
    let config = write_config(temp.path());

    let output = Command::new(env!("CARGO_BIN_EXE_slap"))
        .args(["-c", config.to_str().unwrap(), "-t", "toi_login_0004", "--metadata"])
        .current_dir(temp.path())
        .output()
        .expect("Failed to run slap");

    assert!(output.status.success());
    let records: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["script_id"], "toi_login_0004");
    assert_eq!(records[0]["priority"], 3);
    assert_eq!(records[0]["steps"].as_array().unwrap().len(), 4);
}

#[test]
fn test_binary_requires_a_selection() {
    let output = Command::new(env!("CARGO_BIN_EXE_slap"))
        .args(["--list"])
        .output()
        .expect("Failed to run slap");
    assert!(!output.status.success());
}

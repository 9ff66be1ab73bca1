//! Driver wrapper
//!
//! Adds the waiting and retry behaviour verbs rely on to a raw [`Browser`]
//! session: element lookups poll until the element shows up (or, with
//! `fail`, until the wait runs out without it), scripts are retried once, and
//! page activity can be waited out.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use super::browser::{Browser, BrowserType, By, ElementLocator};
use crate::common::config::Timeouts;
use crate::common::{sanitize, Error, Result};

const SCRIPT_RETRY_DELAY: Duration = Duration::from_secs(1);
const KEY_DELAY: Duration = Duration::from_millis(100);

const ACTIVE_REQUESTS_SCRIPT: &str = "return window.hasOwnProperty('SLAPNetworkListener') ? \
SLAPNetworkListener.getActiveRequestCount() : \
(window.hasOwnProperty('Ajax') && Ajax.hasOwnProperty('activeRequestCount')) ? \
Ajax.activeRequestCount : 0";

/// What to do with an element once found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click,
    SendKeys,
    Clear,
    None,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match sanitize(s).as_str() {
            "click" => Ok(Action::Click),
            "send_keys" => Ok(Action::SendKeys),
            "clear" => Ok(Action::Clear),
            "" | "none" => Ok(Action::None),
            other => Err(Error::Internal(format!("Unknown element action '{}'", other))),
        }
    }
}

/// Options for [`Driver::element_find`]
///
/// Built like `Find::xpath("//a").action(Action::None)`. The default action is
/// a click, matching how most lookups are used.
#[derive(Debug, Clone)]
pub struct Find {
    locator: ElementLocator,
    action: Action,
    keys: Vec<String>,
    index: usize,
    wait: Option<Duration>,
    fail: bool,
    return_list: bool,
}

impl Find {
    pub fn new(locator: ElementLocator) -> Self {
        Self {
            locator,
            action: Action::Click,
            keys: Vec::new(),
            index: 0,
            wait: None,
            fail: false,
            return_list: false,
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(ElementLocator::xpath(value))
    }

    pub fn by(by: By, value: impl Into<String>) -> Self {
        Self::new(ElementLocator::new(by, value))
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Keys to type; sent after any action other than `SendKeys` too
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Expect the element to be absent
    pub fn fail(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Return every match instead of acting on one
    pub fn list(mut self) -> Self {
        self.return_list = true;
        self
    }
}

/// One element of a lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub locator: ElementLocator,
    pub index: usize,
}

/// Outcome of [`Driver::element_find`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    One(ElementRef),
    Many(Vec<ElementRef>),
    /// An expected absence
    Nothing,
}

impl Found {
    pub fn len(&self) -> usize {
        match self {
            Found::One(_) => 1,
            Found::Many(list) => list.len(),
            Found::Nothing => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element(self) -> Option<ElementRef> {
        match self {
            Found::One(el) => Some(el),
            Found::Many(list) => list.into_iter().next(),
            Found::Nothing => None,
        }
    }
}

/// An uncaught javascript error recorded by the error listener snippet
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JsError {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub linenumber: Value,
}

/// Browser session plus the harness' waiting rules
pub struct Driver {
    browser: Box<dyn Browser>,
    browser_type: BrowserType,
    js_snippet_dir: PathBuf,
    element_wait: Duration,
    poll_interval: Duration,
}

impl Driver {
    pub fn new(browser: Box<dyn Browser>, browser_type: BrowserType) -> Self {
        let timeouts = Timeouts::default();
        Self {
            browser,
            browser_type,
            js_snippet_dir: PathBuf::from("assets/js_snippets"),
            element_wait: Duration::from_secs_f64(timeouts.element_wait_secs),
            poll_interval: Duration::from_millis(timeouts.element_poll_ms),
        }
    }

    pub fn with_timeouts(mut self, timeouts: &Timeouts) -> Self {
        self.element_wait = Duration::from_secs_f64(timeouts.element_wait_secs.max(0.0));
        self.poll_interval = Duration::from_millis(timeouts.element_poll_ms.max(1));
        self
    }

    pub fn with_js_snippet_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.js_snippet_dir = dir.into();
        self
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    pub async fn get(&mut self, url: &str) -> Result<()> {
        tracing::debug!("Navigating to {}", url);
        self.browser.goto(url).await
    }

    pub async fn current_url(&mut self) -> Result<String> {
        self.browser.current_url().await
    }

    /// Poll until `locator` matches something or `wait` runs out
    async fn poll_count(&mut self, locator: &ElementLocator, wait: Duration, logs: bool) -> usize {
        let start = Instant::now();
        loop {
            match self.browser.find_all(locator).await {
                Ok(count) if count > 0 => return count,
                Ok(_) => {}
                Err(e) => {
                    if logs {
                        tracing::debug!("Lookup of {} failed: {}", locator, e);
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= wait {
                return 0;
            }
            tokio::time::sleep(self.poll_interval.min(wait - elapsed)).await;
        }
    }

    async fn type_keys(&mut self, el: &ElementRef, keys: &[String]) -> Result<()> {
        for key in keys {
            tracing::debug!("sending [{}] to element", el.locator.value);
            self.browser.send_keys(&el.locator, el.index, key).await?;
            if keys.len() > 1 {
                tokio::time::sleep(KEY_DELAY).await;
            }
        }
        Ok(())
    }

    /// Find an element and act on it
    ///
    /// Without `fail`, a lookup that times out is an [`Error::Timeout`]. With
    /// `fail`, finding the element is the timeout and absence gives
    /// [`Found::Nothing`]. A list lookup never fails; it gives an empty list.
    pub async fn element_find(&mut self, find: Find) -> Result<Found> {
        let Find {
            locator,
            action,
            keys,
            index,
            wait,
            fail,
            return_list,
        } = find;
        let wait = wait.unwrap_or(self.element_wait);

        tracing::debug!("using by_{} to find element [{}]", locator.by, locator.value);
        let count = self.poll_count(&locator, wait, true).await;

        if count == 0 {
            if return_list {
                return Ok(Found::Many(Vec::new()));
            }
            if !fail {
                return Err(Error::timeout(
                    &locator.value,
                    &locator.by.to_string(),
                    wait.as_secs_f64(),
                ));
            }
            return Ok(Found::Nothing);
        }

        if fail {
            return Err(Error::timeout(
                &locator.value,
                &locator.by.to_string(),
                wait.as_secs_f64(),
            ));
        }

        tracing::debug!("Found {} number of elements", count);
        if return_list {
            return Ok(Found::Many(
                (0..count)
                    .map(|index| ElementRef {
                        locator: locator.clone(),
                        index,
                    })
                    .collect(),
            ));
        }

        if index >= count {
            return Err(Error::NoSuchElement(format!(
                "{} index {} of {}",
                locator, index, count
            )));
        }
        let el = ElementRef { locator, index };

        match action {
            // a click with keys only types the keys
            Action::Click if keys.is_empty() => {
                self.browser.click(&el.locator, el.index).await?;
            }
            Action::SendKeys => self.type_keys(&el, &keys).await?,
            Action::Clear => {
                tracing::debug!("Clearing field");
                self.browser.clear(&el.locator, el.index).await?;
            }
            Action::Click | Action::None => {}
        }

        if !keys.is_empty() && action != Action::SendKeys {
            self.type_keys(&el, &keys).await?;
        }

        Ok(Found::One(el))
    }

    /// Wait for `locator` to stop matching
    pub async fn element_gone(
        &mut self,
        locator: &ElementLocator,
        wait: Option<Duration>,
        find_first: bool,
    ) -> Result<()> {
        let wait = wait.unwrap_or(self.element_wait);
        if find_first {
            tracing::debug!("Waiting for element to appear before waiting for it to be gone");
            self.element_find(Find::new(locator.clone()).action(Action::None).wait(wait))
                .await?;
        }

        tracing::debug!(
            "Waiting for element to clear: {} for {:.1} seconds",
            locator,
            wait.as_secs_f64()
        );
        let start = Instant::now();
        loop {
            let count = self
                .poll_count(locator, Duration::from_millis(100), false)
                .await;
            if count == 0 {
                tracing::debug!("Element no longer found after {:?}", start.elapsed());
                return Ok(());
            }
            if start.elapsed() >= wait {
                return Err(Error::Timeout {
                    value: format!("Element still found: {}", locator.value),
                    by: locator.by.to_string(),
                    wait_secs: wait.as_secs_f64(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for an input's value to change from `current_text`
    pub async fn wait_for_text(
        &mut self,
        locator: &ElementLocator,
        current_text: &str,
        wait: Option<Duration>,
        ignore: bool,
    ) -> Result<()> {
        tracing::info!("Waiting for Field to populate with text");
        let wait = wait.unwrap_or(self.element_wait);
        let start = Instant::now();

        loop {
            let el = self
                .element_find(Find::new(locator.clone()).action(Action::None))
                .await?
                .element()
                .ok_or_else(|| Error::NoSuchElement(locator.to_string()))?;
            let value = self.attribute(&el, "value").await?.unwrap_or_default();
            if value != current_text {
                return Ok(());
            }
            if start.elapsed() >= wait {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        if ignore {
            tracing::error!("Text never changed");
            Ok(())
        } else {
            Err(Error::NoSuchElement(format!(
                "input field is {}, expecting it to change",
                current_text
            )))
        }
    }

    pub async fn text(&mut self, el: &ElementRef) -> Result<String> {
        self.browser.text(&el.locator, el.index).await
    }

    pub async fn attribute(&mut self, el: &ElementRef, name: &str) -> Result<Option<String>> {
        self.browser.attribute(&el.locator, el.index, name).await
    }

    /// Run a script, retrying once; failures give `None`
    pub async fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Option<Value> {
        self.run_script(script, args, true, false).await
    }

    /// Like [`execute_script`](Self::execute_script) but logs failures at debug
    pub async fn execute_script_silent(&mut self, script: &str, args: Vec<Value>) -> Option<Value> {
        self.run_script(script, args, true, true).await
    }

    async fn run_script(
        &mut self,
        script: &str,
        args: Vec<Value>,
        retry: bool,
        silent: bool,
    ) -> Option<Value> {
        tracing::debug!("Executing Script: {}", script);
        let attempts = if retry { 2 } else { 1 };

        for attempt in 1..=attempts {
            match self.browser.execute(script, args.clone()).await {
                Ok(value) => return Some(value),
                Err(e) => {
                    if silent {
                        tracing::debug!("JS Exception: {}", e);
                    } else {
                        tracing::error!("JS Exception: {}", e);
                    }
                }
            }
            if attempt < attempts {
                tokio::time::sleep(SCRIPT_RETRY_DELAY).await;
                tracing::debug!("Attempting to repeat script");
            }
        }
        None
    }

    /// Run a script file from the snippet directory
    ///
    /// When `format_text` is given it replaces the first `%s` in the script.
    pub async fn js_snippet(
        &mut self,
        title: &str,
        format_text: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        tracing::debug!("Snippet: {} beginning...", title);
        let path = self.js_snippet_dir.join(title);
        let mut script = read_snippet(&path)?;
        if let Some(text) = format_text {
            script = script.replacen("%s", text, 1);
        }
        let value = self.execute_script(&script, args).await;
        tracing::debug!("Snippet: {} complete...", title);
        Ok(value)
    }

    /// Install the page error listener
    pub async fn listen_js_errors(&mut self) -> Result<()> {
        tracing::debug!("Listening To js errors");
        self.js_snippet("addErrorListener.js", None, Vec::new())
            .await
            .map(|_| ())
    }

    /// Errors recorded since [`listen_js_errors`](Self::listen_js_errors)
    pub async fn js_errors(&mut self) -> Result<Vec<JsError>> {
        let value = self.js_snippet("getErrors.js", None, Vec::new()).await?;
        let errors = match value {
            Some(Value::String(text)) => serde_json::from_str(&text)?,
            Some(list @ Value::Array(_)) => serde_json::from_value(list)?,
            _ => Vec::new(),
        };
        tracing::debug!("The following JS Errors were read: {:?}", errors);
        Ok(errors)
    }

    /// Wait until the page reports no active network requests
    ///
    /// The page must stay quiet for `quiet` before this returns.
    pub async fn wait_for_no_requests(
        &mut self,
        timeout: Option<Duration>,
        quiet: Option<Duration>,
        fail_on_timeout: bool,
    ) -> Result<()> {
        let timeout = timeout.unwrap_or(Duration::from_secs(20));
        let quiet = quiet.unwrap_or(Duration::ZERO);
        let start = Instant::now();
        let mut quiet_since: Option<Instant> = None;

        tracing::debug!("waiting for AJAX to finish");
        while start.elapsed() < timeout {
            let active = self
                .execute_script(ACTIVE_REQUESTS_SCRIPT, Vec::new())
                .await
                .and_then(|v| v.as_i64());
            if active == Some(0) {
                let since = *quiet_since.get_or_insert_with(|| {
                    tracing::debug!("no more AJAX found, starting timer");
                    Instant::now()
                });
                if since.elapsed() >= quiet {
                    tracing::debug!("No more AJAX found after {:?}", start.elapsed());
                    return Ok(());
                }
            } else {
                quiet_since = None;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tracing::debug!("AJAX timed out after {:?}", timeout);
        if fail_on_timeout {
            return Err(Error::Assertion(
                "The AJAX on the page never returned".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn accept_alert(&mut self) -> Result<()> {
        self.browser.accept_alert().await
    }

    pub async fn set_window_rect(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        self.browser.set_window_rect(x, y, width, height).await
    }

    /// Write a PNG of the current page to `path`
    pub async fn save_screenshot(&mut self, path: &Path) -> Result<()> {
        let png = self.browser.screenshot().await?;
        std::fs::write(path, png).map_err(|e| Error::file_write(path, e))
    }

    /// End the browser session
    pub async fn close_driver(&mut self) -> Result<()> {
        tracing::debug!("Closing {} driver", self.browser_type.name());
        self.browser.quit().await
    }
}

fn read_snippet(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))
}

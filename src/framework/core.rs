//! Site independent verb support
//!
//! [`Core`] owns the run's configuration and the active browser session.
//! Site specific cores (like [`TiCore`](super::the_internet::TiCore)) wrap it
//! and add their verb families.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::browser::{BrowserLauncher, BrowserType, DeviceType};
use super::driver::Driver;
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::data::{map_yaml, TestData};

const WINDOW_WIDTH: u32 = 1200;
const WINDOW_HEIGHT: u32 = 1400;

/// Log level for [`Core::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteLevel {
    Debug,
    Info,
    Error,
}

pub struct Core {
    config: Config,
    launcher: Arc<dyn BrowserLauncher>,
    driver: Option<Driver>,
    started: Option<Instant>,
    elapsed: Duration,
    screenshot_dir: PathBuf,
}

impl Core {
    pub fn new(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let screenshot_dir = paths::current_dir(&config.output_dir);
        Self {
            config,
            launcher,
            driver: None,
            started: None,
            elapsed: Duration::ZERO,
            screenshot_dir,
        }
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Start a browser session, replacing any active one
    ///
    /// Browser and device default to the configured values.
    pub async fn get_driver(
        &mut self,
        browser: Option<&str>,
        device: Option<&str>,
    ) -> Result<&mut Driver> {
        let browser: BrowserType = browser.unwrap_or(self.config.browser.as_str()).parse()?;
        let device = device
            .or(self.config.device_type.as_deref())
            .map(str::parse::<DeviceType>)
            .transpose()?;

        if self.driver.is_some() {
            self.close_driver().await?;
        }

        tracing::info!("Attempting to start the webdriver for {}", browser.name());
        let session = self.launcher.launch(browser, device).await?;
        let mut driver = Driver::new(session, browser)
            .with_timeouts(&self.config.timeouts)
            .with_js_snippet_dir(self.config.js_snippet_dir());

        if browser != BrowserType::Ghost {
            let x = self.config.window_x.unwrap_or(0);
            let y = self.config.window_y.unwrap_or(0);
            if let Err(e) = driver.set_window_rect(x, y, WINDOW_WIDTH, WINDOW_HEIGHT).await {
                tracing::warn!("Could not position the browser window: {}", e);
            }
        }

        Ok(self.driver.insert(driver))
    }

    /// The active session
    pub fn driver(&mut self) -> Result<&mut Driver> {
        self.driver.as_mut().ok_or(Error::DriverNotActive)
    }

    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Close the active session, if any
    pub async fn close_driver(&mut self) -> Result<()> {
        match self.driver.take() {
            Some(mut driver) => driver.close_driver().await,
            None => Ok(()),
        }
    }

    /// Load the test data for the configured environment
    ///
    /// `env` replaces the configured environment first.
    pub fn get_test_data(&mut self, env: Option<&str>) -> Result<TestData> {
        if let Some(env) = env {
            tracing::info!("setting the ENV to {}", env);
            self.config.environment = env.to_string();
        }
        tracing::info!("{}", "-".repeat(40));
        tracing::info!("Getting Test Data from yaml files");
        let dir = self.config.test_data_dir();
        tracing::debug!("TestData Path: {}", dir.display());
        map_yaml(
            &dir,
            &self.config.test_data_exclusions(),
            &self.config.environment,
        )
    }

    pub fn timer_start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Stop the timer, returning whole elapsed seconds
    ///
    /// Zero when the timer was never started.
    pub fn timer_end(&mut self) -> u64 {
        self.elapsed = self
            .started
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.elapsed.as_secs()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.as_secs()
    }

    /// Save a screenshot as `PNG_<name> <stamp>.png` in the screenshot dir
    pub async fn take_screenshot(&mut self, name: Option<&str>) -> Result<PathBuf> {
        let dir = self.screenshot_dir.clone();
        tracing::debug!("Using {} as folder for screenshot path", dir.display());
        std::fs::create_dir_all(&dir).map_err(|e| Error::file_write(&dir, e))?;

        let file_name = format!(
            "PNG_{} {}.png",
            name.unwrap_or("ss"),
            paths::time_stamp(chrono::Local::now())
        );
        let path = dir.join(file_name);
        tracing::debug!("Writing screenshot to {}", path.display());
        self.driver()?.save_screenshot(&path).await?;
        Ok(path)
    }

    /// Log a message from a test case
    pub fn write(message: impl std::fmt::Display, level: WriteLevel) {
        match level {
            WriteLevel::Debug => tracing::debug!("{}", message),
            WriteLevel::Info => tracing::info!("{}", message),
            WriteLevel::Error => {
                let rule = "*".repeat(40);
                tracing::error!("\n\n{}\n\n{}\n\n{}\n", rule, message, rule);
            }
        }
    }
}

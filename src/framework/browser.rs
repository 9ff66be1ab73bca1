//! Browser sessions
//!
//! [`Browser`] is the seam between the harness and a live browser. The
//! WebDriver implementation talks to geckodriver/chromedriver through
//! `fantoccini`; tests plug in their own implementation through
//! [`BrowserLauncher`].

use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::common::config::WebDriverConfig;
use crate::common::{sanitize, Error, Result};

/// Strategies for locating elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum By {
    XPath,
    Id,
    Name,
    ClassName,
    CssSelector,
    LinkText,
    PartialLinkText,
    Tag,
}

impl FromStr for By {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match sanitize(s).as_str() {
            "xpath" => Ok(By::XPath),
            "id" => Ok(By::Id),
            "name" => Ok(By::Name),
            "class_name" | "class" => Ok(By::ClassName),
            "css_selector" | "css" => Ok(By::CssSelector),
            "link_text" => Ok(By::LinkText),
            "partial_link_text" => Ok(By::PartialLinkText),
            "tag" | "tag_name" => Ok(By::Tag),
            other => Err(Error::Internal(format!("Unknown locator strategy '{}'", other))),
        }
    }
}

impl std::fmt::Display for By {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            By::XPath => "xpath",
            By::Id => "id",
            By::Name => "name",
            By::ClassName => "class_name",
            By::CssSelector => "css_selector",
            By::LinkText => "link_text",
            By::PartialLinkText => "partial_link_text",
            By::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// A locator strategy together with its query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLocator {
    pub by: By,
    pub value: String,
}

impl ElementLocator {
    pub fn new(by: By, value: impl Into<String>) -> Self {
        Self {
            by,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(By::XPath, value)
    }
}

impl std::fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.by, self.value)
    }
}

/// Operations the harness needs from a browser session
///
/// Elements are addressed by locator and index into the match list instead of
/// by handle, so implementations never hand out references into the session.
#[async_trait]
pub trait Browser: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    async fn current_url(&mut self) -> Result<String>;

    /// Number of elements currently matching `locator`
    async fn find_all(&mut self, locator: &ElementLocator) -> Result<usize>;

    async fn click(&mut self, locator: &ElementLocator, index: usize) -> Result<()>;

    async fn send_keys(&mut self, locator: &ElementLocator, index: usize, keys: &str)
        -> Result<()>;

    async fn clear(&mut self, locator: &ElementLocator, index: usize) -> Result<()>;

    async fn text(&mut self, locator: &ElementLocator, index: usize) -> Result<String>;

    async fn attribute(
        &mut self,
        locator: &ElementLocator,
        index: usize,
        name: &str,
    ) -> Result<Option<String>>;

    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// PNG bytes of the current viewport
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    async fn set_window_rect(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<()>;

    async fn accept_alert(&mut self) -> Result<()>;

    /// End the session
    async fn quit(&mut self) -> Result<()>;
}

/// Browser flavours the harness knows how to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserType {
    Firefox,
    Chrome,
    /// Firefox with touch events and a phone sized responsive view
    Mobile,
    /// Firefox with no profile customisation
    Vanilla,
    /// Headless firefox
    Ghost,
}

impl FromStr for BrowserType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" => Ok(BrowserType::Chrome),
            "mobile" => Ok(BrowserType::Mobile),
            "vanilla" => Ok(BrowserType::Vanilla),
            "ghost" => Ok(BrowserType::Ghost),
            _ => Err(Error::UnknownBrowser(s.to_string())),
        }
    }
}

impl BrowserType {
    pub fn name(self) -> &'static str {
        match self {
            BrowserType::Firefox => "firefox",
            BrowserType::Chrome => "chrome",
            BrowserType::Mobile => "mobile",
            BrowserType::Vanilla => "vanilla",
            BrowserType::Ghost => "ghost",
        }
    }

    /// Driver executable serving this browser
    pub fn service_binary(self) -> &'static str {
        match self {
            BrowserType::Chrome => "chromedriver",
            _ => "geckodriver",
        }
    }
}

/// Device whose user agent the browser pretends to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Iphone,
    Ipad,
    Ipod,
    Android,
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "iphone" => Ok(DeviceType::Iphone),
            "ipad" => Ok(DeviceType::Ipad),
            "ipod" => Ok(DeviceType::Ipod),
            "android" => Ok(DeviceType::Android),
            other => Err(Error::Config(format!("Unknown device type '{}'", other))),
        }
    }
}

fn firefox_user_agent(device: DeviceType) -> &'static str {
    match device {
        DeviceType::Iphone => "Mozilla/5.0 (iPhone; CPU iPhone OS 8_3 like Mac OS X) AppleWebKit/600.1.4 (KHTML, like Gecko) FxiOS/1.0 Mobile/12F69 Safari/600.1.4",
        DeviceType::Ipad => "Mozilla/5.0 (iPad; CPU iPhone OS 8_3 like Mac OS X) AppleWebKit/600.1.4 (KHTML, like Gecko) FxiOS/1.0 Mobile/12F69 Safari/600.1.4",
        DeviceType::Ipod => "Mozilla/5.0 (iPod touch; CPU iPhone OS 8_3 like Mac OS X) AppleWebKit/600.1.4 (KHTML, like Gecko) FxiOS/1.0 Mobile/12F69 Safari/600.1.4",
        DeviceType::Android => "Mozilla/5.0 (Android; Mobile; rv:40.0) Gecko/40.0 Firefox/40.0",
    }
}

// chrome has no ipod agent
fn chrome_user_agent(device: DeviceType) -> Option<&'static str> {
    match device {
        DeviceType::Iphone => Some("Mozilla/5.0 (iPhone; U; CPU iPhone OS 4_0 like Mac OS X; en) AppleWebKit/534.46.0 (KHTML, like Gecko) CriOS/19.0.1084.60 Mobile/9B206 Safari/7534.48.3"),
        DeviceType::Ipad => Some("Mozilla/5.0 (iPad; U; CPU OS 4_3 like Mac OS X; en) AppleWebKit/534.46.0 (KHTML, like Gecko) CriOS/19.0.1084.60 Mobile/9B206 Safari/7534.48.3"),
        DeviceType::Android => Some("Mozilla/5.0 (Linux; Android 5.0.2; SM-G901F Build/LRX22G) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/49.0.2623.87 Mobile Safari/537.36"),
        DeviceType::Ipod => None,
    }
}

const SAVE_TO_DISK_TYPES: &str = "application/octet-stream,application/x-pdf,application/vnd.pdf,\
application/vnd.msexcel,application/zip,application/pdf,text/csv,application/json,text/xml,text/html";

/// WebDriver capabilities for a browser/device combination
pub fn capabilities(
    browser: BrowserType,
    device: Option<DeviceType>,
    headless: bool,
    download_dir: Option<&std::path::Path>,
) -> Map<String, Value> {
    let mut caps = Map::new();

    match browser {
        BrowserType::Chrome => {
            caps.insert("browserName".into(), json!("chrome"));
            let mut args = vec![json!("test-type"), json!("disable-popup-blocking")];
            if headless {
                args.push(json!("--headless"));
                args.push(json!("--disable-gpu"));
            }
            if let Some(agent) = device.and_then(chrome_user_agent) {
                args.push(json!(format!("user-agent={}", agent)));
            }
            let mut options = Map::new();
            options.insert("args".into(), Value::Array(args));
            if let Some(dir) = download_dir {
                options.insert(
                    "prefs".into(),
                    json!({ "download.default_directory": dir.display().to_string() }),
                );
            }
            caps.insert("goog:chromeOptions".into(), Value::Object(options));
        }
        BrowserType::Vanilla => {
            caps.insert("browserName".into(), json!("firefox"));
        }
        BrowserType::Firefox | BrowserType::Mobile | BrowserType::Ghost => {
            caps.insert("browserName".into(), json!("firefox"));

            let mut prefs = Map::new();
            prefs.insert("browser.download.folderList".into(), json!(2));
            prefs.insert("browser.download.manager.showWhenStarting".into(), json!(false));
            prefs.insert("browser.helperApps.alwaysAsk.force".into(), json!(false));
            prefs.insert(
                "browser.helperApps.neverAsk.saveToDisk".into(),
                json!(SAVE_TO_DISK_TYPES),
            );
            prefs.insert("pdfjs.disabled".into(), json!(true));
            prefs.insert("print.always_print_silent".into(), json!(true));
            if let Some(dir) = download_dir {
                prefs.insert("browser.download.dir".into(), json!(dir.display().to_string()));
            }
            if let Some(device) = device {
                prefs.insert(
                    "general.useragent.override".into(),
                    json!(firefox_user_agent(device)),
                );
            }
            if browser == BrowserType::Mobile {
                prefs.insert("devtools.responsiveUI.currentPreset".into(), json!("custom"));
                prefs.insert("dom.w3c_touch_events.enabled".into(), json!(1));
                prefs.insert("devtools.responsiveUI.customHeight".into(), json!(640));
                prefs.insert("devtools.responsiveUI.customWidth".into(), json!(360));
            }

            let mut options = Map::new();
            options.insert("prefs".into(), Value::Object(prefs));
            if headless || browser == BrowserType::Ghost {
                options.insert("args".into(), json!(["-headless"]));
            }
            caps.insert("moz:firefoxOptions".into(), Value::Object(options));
        }
    }

    caps
}

/// Creates browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        browser: BrowserType,
        device: Option<DeviceType>,
    ) -> Result<Box<dyn Browser>>;
}

/// Browser session driven over the W3C WebDriver protocol
pub struct FantocciniBrowser {
    client: fantoccini::Client,
}

enum Query {
    Css(String),
    Id(String),
    LinkText(String),
    XPath(String),
}

impl Query {
    fn from_locator(locator: &ElementLocator) -> Self {
        let value = &locator.value;
        match locator.by {
            By::XPath => Query::XPath(value.clone()),
            By::Id => Query::Id(value.clone()),
            By::LinkText => Query::LinkText(value.clone()),
            By::CssSelector | By::Tag => Query::Css(value.clone()),
            By::Name => Query::Css(format!("[name=\"{}\"]", value)),
            By::ClassName => Query::Css(format!(".{}", value)),
            By::PartialLinkText => Query::XPath(format!("//a[contains(text(), '{}')]", value)),
        }
    }

    fn as_locator(&self) -> fantoccini::Locator<'_> {
        use fantoccini::Locator;
        match self {
            Query::Css(s) => Locator::Css(s),
            Query::Id(s) => Locator::Id(s),
            Query::LinkText(s) => Locator::LinkText(s),
            Query::XPath(s) => Locator::XPath(s),
        }
    }
}

impl FantocciniBrowser {
    pub fn new(client: fantoccini::Client) -> Self {
        Self { client }
    }

    async fn element(
        &self,
        locator: &ElementLocator,
        index: usize,
    ) -> Result<fantoccini::elements::Element> {
        let query = Query::from_locator(locator);
        let mut elements = self.client.find_all(query.as_locator()).await?;
        if index >= elements.len() {
            return Err(Error::NoSuchElement(format!(
                "{} index {} of {}",
                locator,
                index,
                elements.len()
            )));
        }
        Ok(elements.swap_remove(index))
    }
}

#[async_trait]
impl Browser for FantocciniBrowser {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn find_all(&mut self, locator: &ElementLocator) -> Result<usize> {
        let query = Query::from_locator(locator);
        Ok(self.client.find_all(query.as_locator()).await?.len())
    }

    async fn click(&mut self, locator: &ElementLocator, index: usize) -> Result<()> {
        self.element(locator, index).await?.click().await?;
        Ok(())
    }

    async fn send_keys(
        &mut self,
        locator: &ElementLocator,
        index: usize,
        keys: &str,
    ) -> Result<()> {
        self.element(locator, index).await?.send_keys(keys).await?;
        Ok(())
    }

    async fn clear(&mut self, locator: &ElementLocator, index: usize) -> Result<()> {
        self.element(locator, index).await?.clear().await?;
        Ok(())
    }

    async fn text(&mut self, locator: &ElementLocator, index: usize) -> Result<String> {
        Ok(self.element(locator, index).await?.text().await?)
    }

    async fn attribute(
        &mut self,
        locator: &ElementLocator,
        index: usize,
        name: &str,
    ) -> Result<Option<String>> {
        Ok(self.element(locator, index).await?.attr(name).await?)
    }

    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.client.execute(script, args).await?)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn set_window_rect(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<()> {
        self.client.set_window_rect(x, y, width, height).await?;
        Ok(())
    }

    async fn accept_alert(&mut self) -> Result<()> {
        self.client.accept_alert().await?;
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

/// Launches sessions against a WebDriver server, spawning one when configured
pub struct WebDriverLauncher {
    config: WebDriverConfig,
    download_dir: Option<PathBuf>,
    service: Mutex<Option<WebDriverService>>,
}

impl WebDriverLauncher {
    pub fn new(config: WebDriverConfig, download_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            download_dir,
            service: Mutex::new(None),
        }
    }

    /// URL of the server sessions are created on, starting the service if needed
    async fn server_url(&self, browser: BrowserType) -> Result<String> {
        if !self.config.spawn {
            return Ok(self.config.url.clone());
        }

        let mut service = self.service.lock().await;
        if let Some(running) = service.as_ref() {
            if running.binary == browser.service_binary() {
                return Ok(running.url());
            }
        }

        // a different driver binary is needed; the old child is killed on drop
        *service = None;
        let started = WebDriverService::start(
            browser.service_binary(),
            self.config.port,
            Duration::from_secs(self.config.ready_timeout_secs),
        )
        .await?;
        let url = started.url();
        *service = Some(started);
        Ok(url)
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(
        &self,
        browser: BrowserType,
        device: Option<DeviceType>,
    ) -> Result<Box<dyn Browser>> {
        let url = self.server_url(browser).await?;
        let caps = capabilities(
            browser,
            device,
            self.config.headless,
            self.download_dir.as_deref(),
        );

        tracing::debug!("Connecting to {}", url);
        let client = fantoccini::ClientBuilder::native()
            .capabilities(caps)
            .connect(&url)
            .await
            .map_err(|e| Error::SessionStartFailed {
                browser: browser.name().to_string(),
                url: url.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Session started on {}", url);
        Ok(Box::new(FantocciniBrowser::new(client)))
    }
}

/// A geckodriver/chromedriver process owned by the harness
pub struct WebDriverService {
    binary: &'static str,
    port: u16,
    _child: Child,
}

impl WebDriverService {
    /// Spawn `binary` on `port` and wait for it to accept sessions
    pub async fn start(binary: &'static str, port: u16, ready_timeout: Duration) -> Result<Self> {
        let path = which::which(binary).map_err(|e| {
            Error::WebDriverService(format!("{} not found on PATH: {}", binary, e))
        })?;

        tracing::debug!("Spawning {} on port {}", path.display(), port);
        let child = Command::new(&path)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::WebDriverService(format!("Failed to spawn {}: {}", binary, e)))?;

        let service = Self {
            binary,
            port,
            _child: child,
        };
        service.wait_ready(ready_timeout).await?;
        Ok(service)
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let status_url = format!("{}/status", self.url());
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::WebDriverService(format!(
                    "{} did not become ready within {}s",
                    self.binary,
                    timeout.as_secs()
                )));
            }

            tokio::time::sleep(Duration::from_millis(100)).await;

            let Ok(response) = client.get(&status_url).send().await else {
                continue;
            };
            let Ok(status) = response.json::<Value>().await else {
                continue;
            };
            if status["value"]["ready"].as_bool().unwrap_or(false) {
                tracing::debug!("{} is ready", self.binary);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_strategies() {
        assert_eq!("xpath".parse::<By>().unwrap(), By::XPath);
        assert_eq!("CSS Selector".parse::<By>().unwrap(), By::CssSelector);
        assert_eq!("class_name".parse::<By>().unwrap(), By::ClassName);
        assert_eq!(" link text ".parse::<By>().unwrap(), By::LinkText);
        assert!("shadow".parse::<By>().is_err());
    }

    #[test]
    fn test_name_and_class_become_css() {
        let name = Query::from_locator(&ElementLocator::new(By::Name, "username"));
        assert!(matches!(name, Query::Css(ref s) if s == "[name=\"username\"]"));

        let class = Query::from_locator(&ElementLocator::new(By::ClassName, "radius"));
        assert!(matches!(class, Query::Css(ref s) if s == ".radius"));

        let partial = Query::from_locator(&ElementLocator::new(By::PartialLinkText, "Forgot"));
        assert!(matches!(partial, Query::XPath(ref s) if s.contains("contains(text(), 'Forgot')")));
    }

    #[test]
    fn test_browser_type_parse() {
        assert_eq!("Firefox".parse::<BrowserType>().unwrap(), BrowserType::Firefox);
        assert_eq!("ghost".parse::<BrowserType>().unwrap(), BrowserType::Ghost);
        let err = "netscape".parse::<BrowserType>().unwrap_err();
        assert_eq!(err.to_string(), "Browser type [netscape] unknown");
        assert_eq!(BrowserType::Chrome.service_binary(), "chromedriver");
        assert_eq!(BrowserType::Mobile.service_binary(), "geckodriver");
    }

    #[test]
    fn test_firefox_capabilities() {
        let caps = capabilities(
            BrowserType::Mobile,
            Some(DeviceType::Android),
            false,
            Some(std::path::Path::new("/tmp/downloads")),
        );
        assert_eq!(caps["browserName"], "firefox");
        let prefs = &caps["moz:firefoxOptions"]["prefs"];
        assert_eq!(prefs["browser.download.dir"], "/tmp/downloads");
        assert_eq!(prefs["dom.w3c_touch_events.enabled"], 1);
        assert!(prefs["general.useragent.override"]
            .as_str()
            .unwrap()
            .contains("Android"));
        assert!(caps["moz:firefoxOptions"].get("args").is_none());

        let ghost = capabilities(BrowserType::Ghost, None, false, None);
        assert_eq!(ghost["moz:firefoxOptions"]["args"], json!(["-headless"]));
    }

    #[test]
    fn test_chrome_capabilities() {
        let caps = capabilities(BrowserType::Chrome, Some(DeviceType::Iphone), true, None);
        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless")));
        assert!(args
            .iter()
            .any(|a| a.as_str().unwrap().starts_with("user-agent=") && a.as_str().unwrap().contains("iPhone")));

        let vanilla = capabilities(BrowserType::Vanilla, Some(DeviceType::Ipad), true, None);
        assert_eq!(vanilla.len(), 1);
    }
}

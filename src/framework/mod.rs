//! Browser driving: sessions, the driver wrapper and verbs

pub mod browser;
pub mod core;
pub mod driver;
pub mod the_internet;
pub mod verb;

pub use browser::{Browser, BrowserLauncher, BrowserType, By, DeviceType, ElementLocator};
pub use self::core::Core;
pub use driver::{Action, Driver, Find, Found};
pub use the_internet::TiCore;
pub use verb::{Keywords, Verb, VerbArgs, VerbRegistry};

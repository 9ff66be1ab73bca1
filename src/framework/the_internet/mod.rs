//! Verbs for the-internet (https://the-internet.herokuapp.com)
//!
//! Test steps call the three dispatchers on [`TiCore`]. Each looks the
//! target up in its verb family, runs it and reports plain success or
//! failure; the reason for a failure only goes to the log.

pub mod dialog;
pub mod go_to;
pub mod verify;

use std::time::Duration;

use serde_json::Value;

use super::core::Core;
use super::driver::Driver;
use super::verb::{invoke, Keywords, VerbRegistry};
use crate::common::error::ErrorClass;
use crate::common::{sanitize, Error, Result};

/// Verb families of the-internet, plus the shared [`Core`]
pub struct TiCore {
    core: Core,
    go_to: VerbRegistry,
    dialog: VerbRegistry,
    verify: VerbRegistry,
}

impl TiCore {
    pub fn new(core: Core) -> Self {
        Self {
            core,
            go_to: go_to::verbs(),
            dialog: dialog::verbs(),
            verify: verify::verbs(),
        }
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// Navigate to `location`, or to `location_menu` when a menu is given
    ///
    /// # Example
    /// ```ignore
    /// ti.go_to("The Internet", None, &[], &kwargs).await;
    /// ti.go_to("Actions", Some("Products"), &[], &Keywords::new()).await;
    /// ```
    pub async fn go_to(
        &mut self,
        location: &str,
        menu: Option<&str>,
        args: &[Value],
        kwargs: &Keywords,
    ) -> bool {
        tracing::info!("Trying Location {} and Menu {:?}", location, menu);
        let mut name = sanitize(location);
        if let Some(menu) = menu {
            name = format!("{}_{}", name, sanitize(menu));
        }
        tracing::debug!("Using [{}] for Location", name);

        let settle = Duration::from_millis(self.core.config().timeouts.go_to_settle_ms);
        let result = Self::dispatch(&mut self.core, &self.go_to, &name, args, kwargs).await;
        Self::conclude("go_to", result, settle).await
    }

    /// Fill in and submit a form
    pub async fn dialog(&mut self, dialog: &str, args: &[Value], kwargs: &Keywords) -> bool {
        tracing::info!("Trying Dialog {}", dialog);
        let settle = Duration::from_millis(self.core.config().timeouts.dialog_settle_ms);
        let result = Self::dispatch(&mut self.core, &self.dialog, dialog, args, kwargs).await;
        Self::conclude("dialog", result, settle).await
    }

    /// Check the page shows the expected `item`
    pub async fn verify(&mut self, item: Option<&str>, args: &[Value], kwargs: &Keywords) -> bool {
        let settle = Duration::from_millis(self.core.config().timeouts.verify_settle_ms);
        let result = match item {
            Some(item) => {
                tracing::info!("Attempting to verify {}", item);
                Self::dispatch(&mut self.core, &self.verify, item, args, kwargs).await
            }
            None => Err(Error::Assertion(
                "Didn't pass in the Item to evaluate".to_string(),
            )),
        };
        Self::conclude("verify", result, settle).await
    }

    async fn dispatch(
        core: &mut Core,
        family: &VerbRegistry,
        name: &str,
        args: &[Value],
        kwargs: &Keywords,
    ) -> Result<()> {
        let verb = family.get(name)?;
        let listen = core.config().raise_on_js_error;
        let driver = core.driver()?;

        if listen {
            if let Err(e) = driver.listen_js_errors().await {
                tracing::warn!("Could not install the js error listener: {}", e);
            }
        }

        let result = invoke(verb, driver, args, kwargs).await;
        if !listen {
            return result;
        }

        // the verb's own failure outranks the js check
        let checked = check_js_errors(driver).await;
        result.and(checked)
    }

    async fn conclude(family: &str, result: Result<()>, settle: Duration) -> bool {
        match result {
            Ok(()) => {
                tokio::time::sleep(settle).await;
                true
            }
            Err(e) => {
                log_failure(family, &e);
                false
            }
        }
    }
}

async fn check_js_errors(driver: &mut Driver) -> Result<()> {
    let errors = driver.js_errors().await?;
    for e in &errors {
        tracing::error!(
            "JS ERROR - MESSAGE {} - LINE {} - URL {}",
            e.msg,
            e.linenumber,
            e.url
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::JavaScript("Javascript Errors".to_string()))
    }
}

fn log_failure(family: &str, e: &Error) {
    match e.class() {
        ErrorClass::UnknownVerb => {
            tracing::error!("Failed to find {} submodule\n{}", family, e)
        }
        ErrorClass::Timeout => tracing::error!(
            "Timed Out waiting for page to load or element to be found: {}",
            e
        ),
        ErrorClass::NoSuchElement => tracing::error!("Failed to find element {}", e),
        ErrorClass::NotVisible => {
            tracing::error!("Element is not visible, so cannot be clicked: {}", e)
        }
        ErrorClass::Assertion => tracing::error!("{}", e),
        ErrorClass::Unhandled => tracing::error!("Unhandled exception: {} ", e),
    }
}

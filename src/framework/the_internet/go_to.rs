//! Navigation verbs for the-internet demo site

use crate::common::{Error, Result};
use crate::framework::driver::{Action, Driver, Find};
use crate::framework::verb::{Verb, VerbArgs, VerbFuture, VerbRegistry};

pub fn verbs() -> VerbRegistry {
    VerbRegistry::new("go_to")
        .with(Verb::new(
            "the_internet",
            &["url"],
            "Open the-internet home page found at `url`",
            the_internet,
        ))
        .with(Verb::new(
            "form_authentication",
            &[],
            "Follow the Form Authentication link to the login page",
            form_authentication,
        ))
        .with(Verb::new(
            "forgot_password",
            &[],
            "Follow the Forgot Password link",
            forgot_password,
        ))
}

fn the_internet<'a>(driver: &'a mut Driver, args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        let url = args.require_str("the_internet", "url")?;
        driver.get(&url).await?;
        driver
            .element_find(Find::xpath("//h1[text()='Welcome to the-internet']").action(Action::None))
            .await?;
        Ok(())
    })
}

fn form_authentication<'a>(driver: &'a mut Driver, _args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        tracing::info!("Clicking Form Authentication Page");
        driver
            .element_find(Find::xpath("//a[text()='Form Authentication']"))
            .await?;
        driver
            .element_find(Find::xpath("//h2[text()='Login Page']").action(Action::None))
            .await?;
        expect_url(driver, "login", "Expected to find Login in page URL").await
    })
}

fn forgot_password<'a>(driver: &'a mut Driver, _args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        tracing::info!("Navigating to the 'Forgot Password' form");
        driver
            .element_find(Find::xpath("//a[text()='Forgot Password']"))
            .await?;
        tracing::info!("Verifying we navigated correctly");
        driver
            .element_find(Find::xpath("//h2[text()='Forgot Password']").action(Action::None))
            .await?;
        expect_url(driver, "forgot_password", "Expected to find forgot_password in Page URL").await
    })
}

/// Fail with an assertion unless the current URL contains `fragment`
pub(super) async fn expect_url(driver: &mut Driver, fragment: &str, message: &str) -> Result<()> {
    let url = driver.current_url().await?;
    if url.contains(fragment) {
        Ok(())
    } else {
        Err(Error::Assertion(format!("{} (at {})", message, url)))
    }
}

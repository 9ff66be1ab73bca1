//! Form filling verbs for the-internet demo site

use crate::framework::browser::By;
use crate::framework::driver::{Action, Driver, Find};
use crate::framework::verb::{Verb, VerbArgs, VerbFuture, VerbRegistry};

const SUBMIT: &str = "//button[@class='radius']";

pub fn verbs() -> VerbRegistry {
    VerbRegistry::new("dialog")
        .with(Verb::new(
            "login_page",
            &["user", "password"],
            "Fill in the login form with `user` and `password` and submit it",
            login_page,
        ))
        .with(Verb::new(
            "forgot_password",
            &["email"],
            "Submit `email` on the forgot password form",
            forgot_password,
        ))
}

fn login_page<'a>(driver: &'a mut Driver, args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        let user = args.require_str("login_page", "user")?;
        let password = args.require_str("login_page", "password")?;

        tracing::info!("Attempting to complete the form dialog and submit the login credentials");
        tracing::info!("Using {} for username", user);
        driver
            .element_find(Find::by(By::Name, "username").action(Action::SendKeys).keys([user]))
            .await?;
        driver
            .element_find(Find::by(By::Name, "password").action(Action::SendKeys).keys([password]))
            .await?;
        driver.element_find(Find::xpath(SUBMIT)).await?;
        Ok(())
    })
}

fn forgot_password<'a>(driver: &'a mut Driver, args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        let email = args.require_str("forgot_password", "email")?;

        tracing::info!("Submitting {} for email address", email);
        driver
            .element_find(Find::by(By::Name, "email").action(Action::SendKeys).keys([email]))
            .await?;
        driver.element_find(Find::xpath(SUBMIT)).await?;
        Ok(())
    })
}

//! Result checks for the-internet demo site

use super::go_to::expect_url;
use crate::framework::driver::{Action, Driver, Find};
use crate::framework::verb::{Verb, VerbArgs, VerbFuture, VerbRegistry};

pub fn verbs() -> VerbRegistry {
    VerbRegistry::new("verify")
        .with(Verb::new(
            "authenticated",
            &[],
            "The secure area and success banner are shown",
            authenticated,
        ))
        .with(Verb::new(
            "not_authenticated",
            &[],
            "The invalid username banner is shown",
            not_authenticated,
        ))
        .with(Verb::new(
            "password_sent",
            &[],
            "The email sent confirmation page is shown",
            password_sent,
        ))
        .with(Verb::new(
            "password_server_error",
            &[],
            "Submitting an empty email gives a server error",
            password_server_error,
        ))
}

fn present(xpath: &str) -> Find {
    Find::xpath(xpath).action(Action::None)
}

fn authenticated<'a>(driver: &'a mut Driver, _args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        tracing::info!("Form Submitted, Verifying results");
        driver
            .element_find(present("//h2[contains(text(), 'Secure Area')]"))
            .await?;
        tracing::info!("Verifying the banner");
        driver
            .element_find(present("//div[@class='flash success']"))
            .await?;
        Ok(())
    })
}

fn not_authenticated<'a>(driver: &'a mut Driver, _args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        tracing::info!("Form Submitted, Verifying user is not logged in");
        driver
            .element_find(present(
                "//div[@class='flash error' and contains(text(), 'Your username is invalid!')]",
            ))
            .await?;
        tracing::info!("Found invalid user banner");
        Ok(())
    })
}

fn password_sent<'a>(driver: &'a mut Driver, _args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        tracing::info!("Form Submitted verifying that we see the email is sent message");
        driver
            .element_find(present("//div[@id='content' and contains(text(), 'been sent!')]"))
            .await?;
        expect_url(
            driver,
            "email_sent",
            "URL is not correct for the email confirmation page",
        )
        .await
    })
}

fn password_server_error<'a>(driver: &'a mut Driver, _args: &'a VerbArgs) -> VerbFuture<'a> {
    Box::pin(async move {
        tracing::info!("Verifying that with no value in the Form there is a server error");
        driver
            .element_find(present("//h1[contains(text(), 'Internal Server Error')]"))
            .await?;
        expect_url(
            driver,
            "forgot_password",
            "URL is not correct for the email error page",
        )
        .await
    })
}

//! SLAP - browser integration tests from YAML suites
//!
//! Runs the selected test cases against a WebDriver browser and exits with
//! the number of failed tests.

use clap::Parser;
use slap::{cli, commands::Cli};

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    match cli::run(args).await {
        Ok(failures) => std::process::exit(cli::exit_code(failures)),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

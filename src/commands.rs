//! CLI argument definitions
//!
//! Defines the clap arguments for the `slap` test runner.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "slap",
    about = "Executes one or more browser integration tests",
    version,
    long_about = None
)]
#[command(group(
    ArgGroup::new("selection")
        .required(true)
        .args(["all", "file", "suite", "test"])
))]
pub struct Cli {
    /// Browser to run the tests in (firefox, chrome, mobile, vanilla, ghost)
    #[arg(short, long, default_value = "firefox")]
    pub browser: String,

    /// Device profile for the mobile browser (iphone, ipad, ipod, android)
    #[arg(short = 'd', long = "device-type")]
    pub device_type: Option<String>,

    /// Configuration file to use instead of the default lookup
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Environment to test against, overrides the config
    #[arg(short, long)]
    pub env: Option<String>,

    /// Test run id value, 0 when not given
    #[arg(short = 'i', long = "testrun", default_value_t = 0)]
    pub testrun: u32,

    /// Console log level: 0 debug, 1 info, 2 warn, 3 error, 4 critical
    #[arg(short, long = "log-level", value_parser = clap::value_parser!(u8).range(0..=4))]
    pub log_level: Option<u8>,

    /// Run the selected tests this many times
    #[arg(long = "loop", default_value_t = 1)]
    pub loop_count: u32,

    /// Keep a copy of the run's logs and screenshots
    #[arg(long)]
    pub save_log: bool,

    /// Agent name prefixed to the environment
    #[arg(long)]
    pub agent: Option<String>,

    /// Print the selected tests and exit
    #[arg(long)]
    pub list: bool,

    /// Print metadata for the selected tests as JSON and exit
    #[arg(long)]
    pub metadata: bool,

    /// Run every test of the given projects (`all` for every project)
    #[arg(short, long, num_args = 1..)]
    pub all: Option<Vec<String>>,

    /// Run the tests listed in a file, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Run every test of the given suites
    #[arg(short, long, num_args = 1..)]
    pub suite: Option<Vec<String>>,

    /// Run the named tests
    #[arg(short, long, num_args = 1..)]
    pub test: Option<Vec<String>>,
}

//! CLI command handling
//!
//! Turns the parsed arguments into a test list, runs it and reports the
//! number of failures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use tracing::Instrument;

use crate::commands::Cli;
use crate::common::config::Config;
use crate::common::logging::{self, LogLevel, TestLogSink};
use crate::common::{paths, Error, Result};
use crate::data::ErrorCatalog;
use crate::framework::browser::WebDriverLauncher;
use crate::framework::{Core, TiCore};
use crate::testing::{HostInfo, RunReport, TestCatalog, TestRunner};

/// Console level used when neither the flag nor the config sets one
const DEFAULT_LOG_LEVEL: u8 = 1;

/// Run the harness, returning the failure count
pub async fn run(cli: Cli) -> Result<usize> {
    let config_path = Config::locate(cli.config.as_deref()).ok_or_else(|| {
        Error::Config(format!(
            "No {} found; pass one with --config",
            crate::common::config::CONFIG_FILE_NAME
        ))
    })?;
    let config = Config::load(&config_path)?;

    let run_id = new_run_id();
    let stamp = paths::time_stamp(chrono::Local::now());
    let level = cli.log_level.or(config.log_level).unwrap_or(DEFAULT_LOG_LEVEL);

    let current = paths::reset_current_dir(&config.output_dir)
        .map_err(|e| Error::file_write(&paths::current_dir(&config.output_dir), e))?;
    let handles = logging::init(LogLevel::from_number(level), Some(&current));

    let span = tracing::info_span!("run", run_id = %run_id);
    execute(cli, config, &config_path, Run {
        run_id: &run_id,
        stamp: &stamp,
        current: &current,
        test_sink: handles.test_sink.clone(),
    })
    .instrument(span)
    .await
}

/// Per-run values fixed before logging starts
struct Run<'a> {
    run_id: &'a str,
    stamp: &'a str,
    current: &'a Path,
    test_sink: TestLogSink,
}

async fn execute(cli: Cli, mut config: Config, config_path: &Path, run: Run<'_>) -> Result<usize> {
    tracing::debug!("Using config {}", config_path.display());

    let catalog = TestCatalog::load(&config)?;
    let tests = collect_tests(&cli, &catalog, &config.living_dir())?;

    if cli.list {
        let tests = sorted(tests);
        println!("\n{}", tests.join("\n"));
        println!("Total test_cases found: \n{}", tests.len());
        return Ok(0);
    }

    if cli.metadata {
        let records = catalog.get_test_metadata(&tests)?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(0);
    }

    config.browser = cli.browser.clone();
    if let Some(device) = &cli.device_type {
        config.device_type = Some(device.clone());
    }
    config.set("testrun", cli.testrun);

    let host = HostInfo::detect();
    println!("Hostname is {}", host.hostname);
    let report = RunReport::create(run.current, run.run_id, &config.browser, &host)?;

    set_env(&mut config, cli.env.as_deref(), cli.agent.as_deref());

    let errors = ErrorCatalog::load(&config.error_code_dir(), &config.error_code_exclusions())?;
    let output_dir = config.output_dir.clone();
    let launcher = Arc::new(WebDriverLauncher::new(
        config.webdriver.clone(),
        Some(run.current.to_path_buf()),
    ));
    let core = Core::new(config, launcher).with_screenshot_dir(run.current);
    let mut runner = TestRunner::new(TiCore::new(core), catalog, errors)
        .with_report(report)
        .with_test_logs(run.test_sink, run.current)
        .with_run_id(run.run_id);

    println!(
        "\n{} {} {}",
        "Running".blue().bold(),
        tests.len().to_string().white().bold(),
        "tests".blue().bold()
    );

    // the count of the last pass is the one reported
    let mut fail_count = 0;
    for pass in 0..cli.loop_count.max(1) {
        tracing::debug!("Pass {} of {}", pass + 1, cli.loop_count);
        fail_count = runner.run_tests(&tests).await;
    }

    if cli.save_log {
        let archive = output_dir.join(run.stamp);
        let copied = paths::copy_files(run.current, &archive)
            .map_err(|e| Error::file_write(&archive, e))?;
        tracing::info!("Saved {} files to {}", copied, archive.display());
    }

    let summary = format!("Total Failures: [{}]", fail_count);
    if fail_count == 0 {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
    Ok(fail_count)
}

fn new_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..4].to_string()
}

/// Gather the test names selected on the command line
pub fn collect_tests(cli: &Cli, catalog: &TestCatalog, living_dir: &Path) -> Result<Vec<String>> {
    let mut tests = Vec::new();

    if let Some(names) = &cli.test {
        tests.extend(names.iter().cloned());
    } else if let Some(file) = &cli.file {
        let path = resolve_list_file(file, living_dir)?;
        let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
        tests.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    } else if let Some(suites) = &cli.suite {
        for suite in suites {
            tests.extend(catalog.get_tc_list(suite)?);
        }
    } else if let Some(projects) = &cli.all {
        for project in projects {
            tests.extend(catalog.get_all_list(project)?);
        }
    }

    tracing::debug!("Selected {} tests", tests.len());
    Ok(tests)
}

/// A list file given by name is searched for below the living dir
fn resolve_list_file(file: &Path, living_dir: &Path) -> Result<PathBuf> {
    if file.is_file() {
        return Ok(file.to_path_buf());
    }
    let name = file.to_string_lossy();
    paths::find_file(&name, true, living_dir)
        .ok_or_else(|| Error::file_read(file, "no such file"))
}

fn sorted(mut tests: Vec<String>) -> Vec<String> {
    tests.sort();
    tests
}

/// Process exit status for `failures`, saturating at 255
pub fn exit_code(failures: usize) -> i32 {
    failures.min(255) as i32
}

/// Apply the `--env` and `--agent` overrides
///
/// The agent (flag first, then the config) is prepended to the environment
/// and the result lowercased.
pub fn set_env(config: &mut Config, env: Option<&str>, agent: Option<&str>) {
    tracing::debug!("Config ENV: {}", config.environment);
    tracing::debug!("Arg ENV: {:?}", env);
    let mut environment = env.unwrap_or(config.environment.as_str()).to_string();

    if let Some(agent) = agent.map(str::to_string).or_else(|| config.agent.clone()) {
        environment = format!("{}{}", agent, environment);
    }

    config.environment = environment.to_lowercase();
    tracing::info!("Setting final env in config as: {}", config.environment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_set_env() {
        let mut config = Config::default();
        config.environment = "qa".into();

        set_env(&mut config, Some("DC1"), None);
        assert_eq!(config.environment, "dc1");

        config.agent = Some("Bot_".into());
        set_env(&mut config, None, None);
        assert_eq!(config.environment, "bot_dc1");

        set_env(&mut config, Some("QA"), Some("Ci_"));
        assert_eq!(config.environment, "ci_qa");
    }

    #[test]
    fn test_sorted() {
        let tests = vec![
            "test_toi_login_0002".to_string(),
            "test_ti_forms_0001".to_string(),
            "test_toi_login_0001".to_string(),
        ];
        assert_eq!(
            sorted(tests),
            vec!["test_ti_forms_0001", "test_toi_login_0001", "test_toi_login_0002"]
        );
    }

    #[test]
    fn test_collect_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lists")).unwrap();
        std::fs::write(
            dir.path().join("lists/smoke.txt"),
            "toi_login_0001\n\n  toi_login_0002  \n",
        )
        .unwrap();

        let cli = Cli::try_parse_from(["slap", "-f", "smoke.txt"]).unwrap();
        let tests = collect_tests(&cli, &TestCatalog::default(), dir.path()).unwrap();
        assert_eq!(tests, vec!["toi_login_0001", "toi_login_0002"]);

        let cli = Cli::try_parse_from(["slap", "-f", "missing.txt"]).unwrap();
        assert!(collect_tests(&cli, &TestCatalog::default(), dir.path()).is_err());
    }

    #[test]
    fn test_unknown_suite_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from(["slap", "-s", "toi_nope"]).unwrap();
        assert!(matches!(
            collect_tests(&cli, &TestCatalog::default(), dir.path()),
            Err(Error::SuiteNotFound(_))
        ));
    }

    #[test]
    fn test_exit_code_saturates() {
        assert_eq!(exit_code(0), 0);
        assert_eq!(exit_code(3), 3);
        assert_eq!(exit_code(256), 255);
        assert_eq!(exit_code(usize::MAX), 255);
    }

    #[test]
    fn test_run_id_is_four_hex_chars() {
        let id = new_run_id();
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

//! Configuration, output and asset paths

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Timelike};
use regex::Regex;
use walkdir::WalkDir;

/// Name used for the per-user config directory
const APP_NAME: &str = "slap";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/slap/`
/// - macOS: `~/Library/Application Support/slap/`
/// - Windows: `%APPDATA%\slap\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the per-user configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.yaml"))
}

/// Directory holding the logs, screenshots and report of the running pass
pub fn current_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("current")
}

/// Wipe and recreate the `current` output directory
pub fn reset_current_dir(output_dir: &Path) -> io::Result<PathBuf> {
    let current = current_dir(output_dir);
    if current.exists() {
        let _ = std::fs::remove_dir_all(&current);
    }
    std::fs::create_dir_all(&current)?;
    Ok(current)
}

/// Copy every file of `from` into `to`, creating `to` if needed
pub fn copy_files(from: &Path, to: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            std::fs::copy(&path, to.join(entry.file_name()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Time stamp used in log, screenshot and archive names: `MM_DD_YYYY <seconds of day>`
pub fn time_stamp(now: DateTime<Local>) -> String {
    format!(
        "{} {}",
        now.format("%m_%d_%Y"),
        now.num_seconds_from_midnight()
    )
}

/// Strip a ` [XX_0123456789]` unique suffix from a list file name
pub fn sanitize_file_name(name: &str) -> String {
    match Regex::new(r" (\[(\w{2,4}_)?[a-zA-Z0-9]{10}\])") {
        Ok(re) => re.replace_all(name, "").into_owned(),
        Err(_) => name.to_string(),
    }
}

/// Find a file by name below `start`, the last match in walk order wins
///
/// `*` and `?` in the name act as wildcards.
pub fn find_file(name: &str, sanitize: bool, start: &Path) -> Option<PathBuf> {
    let plain = if sanitize {
        let plain = sanitize_file_name(name);
        tracing::info!("Sanitized File Name: {}", plain);
        plain
    } else {
        tracing::debug!("Skipping sanitation");
        name.to_string()
    };

    let matcher = wildcard_regex(&plain)?;
    let found = WalkDir::new(start)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| matcher.is_match(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .last();

    match &found {
        Some(path) => tracing::debug!("File path: {}", path.display()),
        None => tracing::debug!("Couldn't find {}", plain),
    }
    found
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

//! Logging and tracing configuration
//!
//! Console output level comes from the `--log-level` flag (or `RUST_LOG`).
//! Every run also writes a full debug log to `run.log` in the output
//! directory, and each test case gets its own `LOG_<test> <stamp>.log` file
//! through a writer the runner points at a new file before every test.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Console verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Map the numeric level used by the CLI and config (0 = debug ... 4 = critical)
    pub fn from_number(level: u8) -> Self {
        match level {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            _ => LogLevel::Critical,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            // tracing has no level above error
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Writer target that the runner re-points at a new file for every test
#[derive(Clone, Default)]
pub struct TestLogSink {
    file: Arc<Mutex<Option<File>>>,
}

impl TestLogSink {
    /// Start writing to `path`, creating its directory if needed
    pub fn open(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::other("test log sink poisoned"))?;
        *slot = Some(file);
        Ok(())
    }

    /// Stop writing test output
    pub fn close(&self) {
        if let Ok(mut slot) = self.file.lock() {
            *slot = None;
        }
    }
}

pub struct TestLogWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for TestLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::other("test log sink poisoned"))?;
        match slot.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut slot = self
            .file
            .lock()
            .map_err(|_| io::Error::other("test log sink poisoned"))?;
        match slot.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for TestLogSink {
    type Writer = TestLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TestLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Handles that must live as long as the run
pub struct LogHandles {
    /// Per-test log file target
    pub test_sink: TestLogSink,
    _guard: Option<WorkerGuard>,
}

fn crate_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "slap={level},fantoccini=error,hyper=error,reqwest=error,warn"
    ))
}

/// Initialize tracing for a run
///
/// Console level is controlled by `RUST_LOG` when set, else by `level`.
/// When `log_dir` is given a debug-level `run.log` is written there.
pub fn init(level: LogLevel, log_dir: Option<&Path>) -> LogHandles {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| crate_filter(level.directive()));

    let console_layer = if level == LogLevel::Debug {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    };

    let test_sink = TestLogSink::default();
    let test_layer = fmt::layer()
        .with_writer(test_sink.clone())
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(crate_filter("debug"));

    let (run_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "run.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_filter(crate_filter("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(console_layer.with_filter(console_filter))
        .with(test_layer)
        .with(run_layer)
        .try_init()
    {
        eprintln!("Warning: logging already initialized: {}", e);
    }

    LogHandles {
        test_sink,
        _guard: guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from_number(0), LogLevel::Debug);
        assert_eq!(LogLevel::from_number(1), LogLevel::Info);
        assert_eq!(LogLevel::from_number(9), LogLevel::Critical);
        assert_eq!(LogLevel::Critical.directive(), "error");
    }

    #[test]
    fn test_sink_switches_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TestLogSink::default();

        let mut writer = sink.make_writer();
        writer.write_all(b"dropped\n").unwrap();

        sink.open(&dir.path().join("logs").join("first.log")).unwrap();
        sink.make_writer().write_all(b"one\n").unwrap();
        sink.open(&dir.path().join("logs").join("second.log")).unwrap();
        sink.make_writer().write_all(b"two\n").unwrap();
        sink.close();

        let first = std::fs::read_to_string(dir.path().join("logs").join("first.log")).unwrap();
        let second = std::fs::read_to_string(dir.path().join("logs").join("second.log")).unwrap();
        assert_eq!(first, "one\n");
        assert_eq!(second, "two\n");
    }
}

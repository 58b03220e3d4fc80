//! Logging setup.
//!
//! - Writes to `<log_dir>/webimage.log`, truncated at session start
//! - Optionally mirrors to stderr so it does not mix with command output
//! - Level from `RUST_LOG`, `info` otherwise

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the background log writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the log directory cannot be created, the previous log cannot be
/// truncated, or a global subscriber is already installed.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    console: bool,
) -> Result<LoggingGuard, io::Error> {
    fs::create_dir_all(log_dir)?;

    let path = log_dir.join(log_file);
    fs::write(&path, "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .compact()
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

/// `<platform cache dir>/webimage/logs`
pub fn default_log_dir() -> PathBuf {
    crate::config::default_cache_directory().join("logs")
}

pub fn default_log_file() -> &'static str {
    "webimage.log"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_log_file(), "webimage.log");
        assert!(default_log_dir().ends_with("webimage/logs"));
    }

    #[test]
    fn test_guard_structure() {
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(io::sink());
        drop(non_blocking);

        let logging_guard = LoggingGuard {
            _file_guard: guard,
            path: PathBuf::from("x.log"),
        };
        assert_eq!(logging_guard.path(), Path::new("x.log"));
    }

    // Installing the global subscriber can only happen once per process, so
    // this is the only test that calls init_logging.
    #[test]
    fn test_init_truncates_previous_log() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join("test.log"), "previous session").unwrap();

        let guard = init_logging(&log_dir, "test.log", false).unwrap();

        assert_eq!(guard.path(), log_dir.join("test.log"));
        assert_eq!(fs::read_to_string(guard.path()).unwrap(), "");
    }
}

//! Process-wide file logging for storage diagnostics.
//!
//! # Responsibility
//! - Start one size-rotated `flexi_logger` file logger per process.
//! - Capture panics as sanitized `event=panic_captured` lines.
//!
//! # Invariants
//! - Initialization never panics.
//! - Repeating initialization with the same level and directory is a no-op;
//!   any other combination is rejected.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "docstore";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    directory: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDirectory { path: PathBuf, reason: String },
    /// Logging already runs with another level or directory.
    Conflict {
        active_level: &'static str,
        active_directory: PathBuf,
    },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory { path, reason } => {
                write!(f, "invalid log directory `{}`: {reason}", path.display())
            }
            Self::Conflict {
                active_level,
                active_directory,
            } => write!(
                f,
                "logging already initialized with level `{active_level}` at `{}`",
                active_directory.display()
            ),
            Self::Backend(message) => write!(f, "failed to start logger: {message}"),
        }
    }
}

impl Error for LoggingError {}

/// Starts file logging at `level` into `log_dir`.
///
/// Relative directories resolve against the current working directory.
///
/// # Errors
/// - `UnsupportedLevel` for anything but trace|debug|info|warn|error.
/// - `InvalidDirectory` when the directory is empty or cannot be created.
/// - `Conflict` when logging already runs with another configuration.
pub fn init_logging(level: &str, log_dir: &Path) -> Result<(), LoggingError> {
    let level = normalize_level(level)?;
    let directory = resolve_directory(log_dir)?;

    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(level, &directory))?;
    if active.level != level || active.directory != directory {
        return Err(LoggingError::Conflict {
            active_level: active.level,
            active_directory: active.directory.clone(),
        });
    }
    Ok(())
}

/// Returns `(level, directory)` of the running logger.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.level, active.directory.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: &'static str, directory: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(directory).map_err(|err| LoggingError::InvalidDirectory {
        path: directory.to_path_buf(),
        reason: err.to_string(),
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(directory)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={} version={}",
        directory.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        directory: directory.to_path_buf(),
        _handle: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        _ => Err(LoggingError::UnsupportedLevel(level.trim().to_string())),
    }
}

fn resolve_directory(log_dir: &Path) -> Result<PathBuf, LoggingError> {
    if log_dir.as_os_str().is_empty() {
        return Err(LoggingError::InvalidDirectory {
            path: log_dir.to_path_buf(),
            reason: "path is empty".to_string(),
        });
    }
    if log_dir.is_absolute() {
        return Ok(log_dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(log_dir))
        .map_err(|err| LoggingError::InvalidDirectory {
            path: log_dir.to_path_buf(),
            reason: err.to_string(),
        })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

/// Flattens line breaks and caps the length at `max_chars`.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut capped = flattened.chars().take(max_chars).collect::<String>();
    capped.push_str("...");
    capped
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, logging_status, normalize_level, resolve_directory, single_line,
        LoggingError,
    };
    use std::path::Path;

    #[test]
    fn levels_are_normalized() {
        assert_eq!(normalize_level(" WARNING ").unwrap(), "warn");
        assert_eq!(normalize_level("Trace").unwrap(), "trace");
        assert_eq!(
            normalize_level("verbose").unwrap_err(),
            LoggingError::UnsupportedLevel("verbose".to_string())
        );
    }

    #[test]
    fn relative_directories_resolve_against_cwd() {
        let resolved = resolve_directory(Path::new("logs")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("logs"));
        assert!(resolve_directory(Path::new("")).is_err());
    }

    #[test]
    fn single_line_flattens_and_caps() {
        assert_eq!(single_line("a\nb", 10), "a b");
        assert_eq!(single_line("abcdefgh", 4), "abcd...");
    }

    #[test]
    fn init_is_idempotent_and_rejects_other_configurations() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        init_logging("info", first.path()).unwrap();
        init_logging("INFO", first.path()).unwrap();

        assert!(matches!(
            init_logging("debug", first.path()),
            Err(LoggingError::Conflict { .. })
        ));
        assert!(matches!(
            init_logging("info", second.path()),
            Err(LoggingError::Conflict { .. })
        ));

        let (level, directory) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(directory, first.path());
    }
}

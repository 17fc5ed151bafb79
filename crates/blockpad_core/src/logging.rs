//! Rolling file logs.
//!
//! # Responsibility
//! - Start the file logger once per process.
//! - Capture panics as log events before the default hook runs.
//!
//! # Invariants
//! - Initialisation never panics.
//! - A second initialisation with the same settings is a no-op; different
//!   settings are rejected.
//! - Events carry metadata only; block bodies are never logged.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "blockpad";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    dir: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    RelativeDir(PathBuf),
    CreateDir { dir: PathBuf, source: io::Error },
    Backend(String),
    /// Logger already running with other settings.
    Conflict { active: String, requested: String },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute: {}", dir.display())
            }
            Self::CreateDir { dir, source } => {
                write!(f, "cannot create log directory {}: {source}", dir.display())
            }
            Self::Backend(message) => write!(f, "failed to start logger: {message}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already running with {active}; refusing {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Starts file logging at `level` into `dir`.
///
/// # Errors
/// - `UnknownLevel`, `RelativeDir`, `CreateDir`, `Backend` for bad input or
///   backend failures.
/// - `Conflict` when already running with a different level or directory.
pub fn init_logging(level: &str, dir: &Path) -> Result<(), LoggingError> {
    let level = normalize_level(level)?;
    if !dir.is_absolute() {
        return Err(LoggingError::RelativeDir(dir.to_path_buf()));
    }

    let active = ACTIVE.get_or_try_init(|| start(level, dir))?;
    if active.dir != dir || active.level != level {
        return Err(LoggingError::Conflict {
            active: format!("level={} dir={}", active.level, active.dir.display()),
            requested: format!("level={level} dir={}", dir.display()),
        });
    }
    Ok(())
}

fn start(level: &'static str, dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
        dir: dir.to_path_buf(),
        source,
    })?;
    let handle = Logger::try_with_str(level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=app_start module=logging status=ok platform={} version={} level={level} log_dir={}",
        env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        dir.display()
    );
    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

/// Active `(level, directory)`, or `None` before initialisation.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE.get().map(|active| (active.level, active.dir.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// `$XDG_STATE_HOME/blockpad/logs`, else `~/.local/state/blockpad/logs`,
/// else a folder under the system temp directory.
pub fn default_log_dir() -> PathBuf {
    let base = env::var_os("XDG_STATE_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            env::var_os("HOME")
                .filter(|value| !value.is_empty())
                .map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(env::temp_dir);
    base.join("blockpad").join("logs")
}

fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnknownLevel(other.to_string())),
    }
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            single_line(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Joins lines and caps length so one event stays on one log line.
fn single_line(value: &str, limit: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut capped: String = flat.chars().take(limit).collect();
    if flat.chars().count() > limit {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, normalize_level, single_line, LoggingError};
    use std::path::Path;

    #[test]
    fn levels_are_normalised() {
        assert_eq!(normalize_level(" WARNING ").expect("warning is known"), "warn");
        assert!(matches!(
            normalize_level("verbose"),
            Err(LoggingError::UnknownLevel(_))
        ));
    }

    #[test]
    fn relative_dir_is_rejected() {
        assert!(matches!(
            init_logging("info", Path::new("logs/dev")),
            Err(LoggingError::RelativeDir(_))
        ));
    }

    #[test]
    fn payload_is_flattened_and_capped() {
        let flat = single_line("line1\nline2\rline3", 8);
        assert!(!flat.contains(['\n', '\r']));
        assert!(flat.ends_with("..."));
    }

    #[test]
    fn second_init_must_match_first() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");

        init_logging("info", first.path()).expect("first init succeeds");
        init_logging("info", first.path()).expect("same settings are idempotent");
        assert!(matches!(
            init_logging("debug", first.path()),
            Err(LoggingError::Conflict { .. })
        ));
        assert!(matches!(
            init_logging("info", second.path()),
            Err(LoggingError::Conflict { .. })
        ));

        let (level, dir) = logging_status().expect("logging is active");
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}

//! Tracing configuration and log routing.
//!
//! Events go to stderr, which keeps stdout free for the JSON printed by `docsum summarize`.
//! A second copy is written without ANSI colours to a log file (`logs/docsum.log` unless
//! `DOCSUM_LOG_FILE` names another path, or `off` to disable it). `DOCSUM_LOG_ROTATION`
//! selects `never` (default), `hourly` or `daily` rotation for that file.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "docsum.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where and how log output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives, taken from `RUST_LOG`.
    pub filter: String,
    /// File target; `None` logs to stderr only.
    pub file: Option<LogFile>,
}

/// File log target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    /// Directory holding the log file; created when missing.
    pub directory: PathBuf,
    /// File name, or the prefix of dated names when rotating.
    pub file_name: String,
    /// Rotation period.
    pub rotation: Rotation,
}

impl LogSettings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through `lookup`, which returns the value of a variable when set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup("RUST_LOG")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let rotation = match lookup("DOCSUM_LOG_ROTATION") {
            Some(value) => parse_rotation(&value).unwrap_or_else(|| {
                eprintln!("Unknown DOCSUM_LOG_ROTATION {value:?}; using never");
                Rotation::NEVER
            }),
            None => Rotation::NEVER,
        };
        let file = match lookup("DOCSUM_LOG_FILE").as_deref().map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("off") => None,
            Some(value) if !value.is_empty() => LogFile::at(Path::new(value), rotation),
            _ => Some(LogFile {
                directory: PathBuf::from(DEFAULT_LOG_DIR),
                file_name: DEFAULT_LOG_NAME.to_string(),
                rotation,
            }),
        };
        Self { filter, file }
    }
}

impl LogFile {
    fn at(path: &Path, rotation: Rotation) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some(Self {
            directory,
            file_name,
            rotation,
        })
    }
}

fn parse_rotation(value: &str) -> Option<Rotation> {
    match value.trim().to_ascii_lowercase().as_str() {
        "never" => Some(Rotation::NEVER),
        "hourly" => Some(Rotation::HOURLY),
        "daily" => Some(Rotation::DAILY),
        _ => None,
    }
}

/// Install the global subscriber using settings from the environment.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    init_tracing_with(&LogSettings::from_env());
}

/// Install the global subscriber described by `settings`.
pub fn init_tracing_with(settings: &LogSettings) {
    let env_filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|error| {
        eprintln!("Invalid RUST_LOG {:?}: {error}; using {DEFAULT_FILTER}", settings.filter);
        EnvFilter::new(DEFAULT_FILTER)
    });
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    match settings.file.as_ref().and_then(file_writer) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            let _ = registry.with(file_layer).try_init();
        }
        None => {
            let _ = registry.try_init();
        }
    }
}

/// Build a non-blocking writer for `target`, or `None` when the file cannot be set up.
fn file_writer(target: &LogFile) -> Option<NonBlocking> {
    if let Err(err) = std::fs::create_dir_all(&target.directory) {
        eprintln!(
            "Failed to create log directory {}: {err}",
            target.directory.display()
        );
        return None;
    }
    let appender = RollingFileAppender::builder()
        .rotation(target.rotation.clone())
        .filename_prefix(&target.file_name)
        .build(&target.directory);
    match appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", target.file_name);
            None
        }
    }
}

//! Logging for the CLI.
//!
//! Two sinks, neither of them stdout (that belongs to the bump report and
//! the `--json` document):
//!
//! - **console**: warnings and errors on stderr, so a tag created without a
//!   commit or a refused release-notes check reaches the operator. `-v`/`-vv`
//!   widen it to debug/trace, `--quiet` narrows it to errors.
//! - **log file**: every event allowed by the level filter, one JSON object
//!   per line, so the exact lines a bump rewrote can be audited later.
//!
//! The log file lives at `VERBUMP_LOG_PATH`, else `VERBUMP_LOG_DIR/verbump.jsonl`,
//! else `<log_dir setting>/verbump.jsonl`, else under the user data directory.
//! An explicit location that cannot be written is reported on the console;
//! a missing default location just means no log file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "VERBUMP_LOG_PATH";
const ENV_LOG_DIR: &str = "VERBUMP_LOG_DIR";
const LOG_FILE_NAME: &str = "verbump.jsonl";

/// Target of the final error record. `main` already prints that error on
/// stderr, so the console sink skips it.
pub const FATAL_TARGET: &str = "verbump::fatal";

/// Logging choices gathered from flags and settings.
#[derive(Clone, Debug)]
pub struct LogSettings<'a> {
    /// `log_dir` from the settings file.
    pub log_dir: Option<&'a Path>,
    /// `log_level` from the settings file; used when neither flags nor
    /// `RUST_LOG` say otherwise.
    pub default_level: &'a str,
    /// `--quiet`.
    pub quiet: bool,
    /// `-v` count.
    pub verbose: u8,
    /// Color the console sink.
    pub ansi: bool,
}

/// Keeps the log file writer flushing until dropped.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the console and file sinks as the global subscriber.
pub fn init(settings: &LogSettings<'_>) -> Result<LogGuard> {
    let console_max = console_level(settings.quiet, settings.verbose);
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(settings.ansi)
        .without_time()
        .with_target(false)
        .with_filter(filter_fn(move |meta| {
            meta.target() != FATAL_TARGET && *meta.level() <= console_max
        }));

    let target = resolve_log_file(
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        settings.log_dir.map(Path::to_path_buf),
        default_log_dir(),
    );
    let (file_path, unusable) = match target {
        Ok(path) => (path, None),
        Err(err) => (None, Some(err)),
    };

    let (file, guard) = match &file_path {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(writer)
                .with_filter(env_filter(
                    settings.quiet,
                    settings.verbose,
                    settings.default_level,
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    if let Some(err) = unusable {
        tracing::warn!(error = %format!("{err:#}"), "not writing a log file");
    }
    tracing::debug!(log_file = ?file_path, "logging initialized");

    Ok(LogGuard { _file: guard })
}

/// Level filter for the log file.
///
/// Priority: quiet flag > verbose flag > `RUST_LOG` > `default_level`.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    if verbose > 0 {
        let level = match verbose {
            1 => "debug",
            _ => "trace",
        };
        return EnvFilter::new(level);
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Most verbose level shown on stderr.
pub const fn console_level(quiet: bool, verbose: u8) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

fn default_log_dir() -> Option<PathBuf> {
    verbump_core::config::user_data_local_dir().map(|dir| dir.into_std_path_buf().join("logs"))
}

/// Pick the log file.
///
/// Explicit locations (path, dir, settings dir) must be writable; the
/// default location is used only if it is.
fn resolve_log_file(
    path_override: Option<PathBuf>,
    dir_override: Option<PathBuf>,
    settings_dir: Option<PathBuf>,
    default_dir: Option<PathBuf>,
) -> Result<Option<PathBuf>> {
    let explicit = path_override.or_else(|| {
        dir_override
            .or(settings_dir)
            .map(|dir| dir.join(LOG_FILE_NAME))
    });
    if let Some(path) = explicit {
        ensure_writable(&path)?;
        return Ok(Some(path));
    }

    Ok(default_dir
        .map(|dir| dir.join(LOG_FILE_NAME))
        .filter(|path| ensure_writable(path).is_ok()))
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
    let name = path
        .file_name()
        .with_context(|| format!("log path {} has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir, name))
}

fn ensure_writable(path: &Path) -> Result<()> {
    let (dir, _) = split_log_path(path)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(())
}

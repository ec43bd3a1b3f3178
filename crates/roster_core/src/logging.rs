//! File logging bootstrap for the registry core.
//!
//! # Responsibility
//! - Start one size-rotated file logger per process.
//! - Record panics as sanitized single-line events.
//!
//! # Invariants
//! - Repeated init with identical settings is a no-op.
//! - Init with different settings after a successful init is rejected.
//! - Init never panics.

use crate::config::{LogLevel, LogSettings};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::panic::PanicHookInfo;
use std::path::PathBuf;

const LOG_FILE_BASENAME: &str = "roster";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_SUMMARY_MAX_CHARS: usize = 160;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts the file logger described by `settings`.
///
/// # Errors
/// - Logging was already started with other settings.
/// - The log directory cannot be created.
/// - The logger backend fails to start.
pub fn init_logging(settings: &LogSettings) -> Result<(), String> {
    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(settings))?;
    if active.settings != *settings {
        return Err(format!(
            "logging already initialized with level `{}` at `{}`; refusing to switch to level `{}` at `{}`",
            active.settings.level.as_str(),
            active.settings.log_dir.display(),
            settings.level.as_str(),
            settings.log_dir.display()
        ));
    }
    Ok(())
}

/// Returns `(level, log_dir)` of the running logger, if any.
pub fn logging_status() -> Option<(LogLevel, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.settings.level, active.settings.log_dir.clone()))
}

fn start_logger(settings: &LogSettings) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&settings.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            settings.log_dir.display()
        )
    })?;

    let handle = Logger::try_with_str(settings.level.as_str())
        .map_err(|err| format!("invalid log level `{}`: {err}", settings.level.as_str()))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook();

    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={}",
        settings.level.as_str(),
        settings.log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            panic_summary(panic_info)
        );
        previous(panic_info);
    }));
}

fn panic_summary(info: &PanicHookInfo<'_>) -> String {
    let payload = info
        .payload()
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    single_line(&payload, PANIC_SUMMARY_MAX_CHARS)
}

// Panic payloads may carry personal data from registry records.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut capped: String = flattened.chars().take(max_chars).collect();
    if flattened.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

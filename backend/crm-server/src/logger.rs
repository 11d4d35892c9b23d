//! fern-backed logging for the server binary.
//!
//! Three output shapes share one line format: colored stdout for a TTY,
//! plain stdout for systemd/docker, and an append-only file when
//! `logging.file` is configured. File output never carries color codes.

use crate::error::{Result as ServerResult, ServerError};

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::info;

pub fn initialize(
    log_level: crm_config::LogLevel,
    log_file: Option<PathBuf>,
    colored: bool,
) -> ServerResult<()> {
    let output = match (&log_file, colored) {
        (Some(path), _) => file_output(path)?,
        (None, true) => colored_stdout(),
        (None, false) => plain_stdout(),
    };

    Dispatch::new()
        .level(log_level.0)
        .chain(output)
        .apply()
        .map_err(|e| ServerError::Logger {
            message: format!("Failed to initialize logger: {e}"),
        })?;

    match &log_file {
        Some(path) => info!("Logging at {} to {}", log_level.0, path.display()),
        None => info!("Logging at {} to stdout", log_level.0),
    }

    // Dependencies that emit tracing events land in the log output too.
    tracing_log::LogTracer::init().ok();

    Ok(())
}

fn write_line(
    out: FormatCallback<'_>,
    message: &std::fmt::Arguments<'_>,
    record: &log::Record<'_>,
    level: impl Display,
) {
    out.finish(format_args!(
        "[{date} - {level}] {message} [{file}:{line}]",
        date = humantime::format_rfc3339(SystemTime::now()),
        level = level,
        message = message,
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0),
    ));
}

fn file_output(path: &Path) -> ServerResult<Dispatch> {
    let file = fern::log_file(path).map_err(|e| ServerError::Logger {
        message: format!("Failed to open log file {}: {}", path.display(), e),
    })?;

    Ok(Dispatch::new()
        .format(|out, message, record| write_line(out, message, record, record.level()))
        .chain(file))
}

fn colored_stdout() -> Dispatch {
    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, message, record, colors.color(record.level()))
        })
        .chain(std::io::stdout())
}

fn plain_stdout() -> Dispatch {
    Dispatch::new()
        .format(|out, message, record| write_line(out, message, record, record.level()))
        .chain(std::io::stdout())
}

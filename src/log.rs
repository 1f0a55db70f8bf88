//! Initialisation of the program logger.
//!
//! Messages go to the console and, when an output folder is given, to log files in that folder.
//! Iteration details of the attack search are always written to their own file at `debug` level,
//! whatever level is chosen for the console.
use anyhow::{Context, Result};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Metadata, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// The environment variable which overrides the log level
pub const LOG_LEVEL_ENV_VAR: &str = "CESM_LOG_LEVEL";

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the CESM_LOG_LEVEL
/// environment variable or the settings.toml file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file for messages about the ordinary operation of the program
const LOG_INFO_FILE_NAME: &str = "cesm_info.log";

/// Log file for warnings and errors
const LOG_ERROR_FILE_NAME: &str = "cesm_error.log";

/// Log file for the progress of the attack search
const LOG_ATTACK_FILE_NAME: &str = "cesm_attack.log";

/// Messages whose target starts with this are written to the attack log
const ATTACK_TARGET_PREFIX: &str = "cesm::attack";

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Work out which log level to use.
///
/// The `CESM_LOG_LEVEL` environment variable takes precedence over the level from the settings
/// file. Level names are case-insensitive.
fn resolve_log_level(log_level_from_settings: Option<&str>) -> Result<LevelFilter> {
    let log_level = env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| {
        log_level_from_settings
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    });

    LevelFilter::from_str(&log_level)
        .ok()
        .with_context(|| format!("Unknown log level: {log_level}"))
}

/// Initialise the program logger.
///
/// Possible log levels are `off`, `error`, `warn`, `info`, `debug` and `trace`. Calling this
/// function again once the logger is running has no effect.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_path`: The folder in which to save log files, if any
pub fn init(log_level_from_settings: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = resolve_log_level(log_level_from_settings)?;

    // The logger can only be set once per process, e.g. when running several commands in tests
    if is_logger_initialised() {
        return Ok(());
    }

    let mut dispatch = Dispatch::new()
        .chain(console_dispatch(log_level, false))
        .chain(console_dispatch(log_level, true));

    if let Some(dir) = log_file_path {
        let create = |file_name| {
            let file_path = dir.join(file_name);
            File::create(&file_path)
                .with_context(|| format!("Could not create log file {}", file_path.display()))
        };

        dispatch = dispatch
            .chain(
                Dispatch::new()
                    .filter(is_not_warning)
                    .format(write_log_plain)
                    .level(log_level.max(LevelFilter::Info))
                    .chain(create(LOG_INFO_FILE_NAME)?),
            )
            .chain(
                Dispatch::new()
                    .format(write_log_plain)
                    .level(LevelFilter::Warn)
                    .chain(create(LOG_ERROR_FILE_NAME)?),
            )
            .chain(
                Dispatch::new()
                    .filter(|metadata| metadata.target().starts_with(ATTACK_TARGET_PREFIX))
                    .format(write_log_plain)
                    .level(LevelFilter::Debug)
                    .chain(create(LOG_ATTACK_FILE_NAME)?),
            );
    }

    dispatch.apply()?;
    let _ = LOGGER_INIT.set(());

    Ok(())
}

fn is_not_warning(metadata: &Metadata) -> bool {
    metadata.level() > LevelFilter::Warn
}

/// Logging to the console: warnings and errors go to stderr and everything else to stdout
fn console_dispatch(log_level: LevelFilter, to_stderr: bool) -> Dispatch {
    let use_colour = if to_stderr {
        std::io::stderr().is_terminal()
    } else {
        std::io::stdout().is_terminal()
    };
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    let dispatch = Dispatch::new().format(move |out, message, record| {
        if use_colour {
            write_log(out, colours.color(record.level()), record.target(), message);
        } else {
            write_log_plain(out, message, record);
        }
    });

    if to_stderr {
        dispatch
            .level(log_level.min(LevelFilter::Warn))
            .chain(std::io::stderr())
    } else {
        dispatch
            .filter(is_not_warning)
            .level(log_level)
            .chain(std::io::stdout())
    }
}

fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("debug"), LevelFilter::Debug)]
    #[case(Some("WARN"), LevelFilter::Warn)]
    #[case(Some("off"), LevelFilter::Off)]
    #[case(None, LevelFilter::Info)]
    fn test_resolve_log_level(#[case] from_settings: Option<&str>, #[case] expected: LevelFilter) {
        // SAFETY: no other test reads this variable
        unsafe { env::remove_var(LOG_LEVEL_ENV_VAR) };
        assert_eq!(resolve_log_level(from_settings).unwrap(), expected);
    }

    #[test]
    fn test_init_unknown_level() {
        // SAFETY: no other test reads this variable
        unsafe { env::remove_var(LOG_LEVEL_ENV_VAR) };
        assert!(init(Some("loud"), None).is_err());
    }
}

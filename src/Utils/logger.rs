use chrono::Local;
use simplelog::*;
use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("loglevel must be off, none, debug, info, warn or error, got '{0}'")]
    InvalidLevel(String),
    #[error("could not create log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("a global logger is already installed")]
    AlreadyInitialised,
}

pub fn level_filter(level: &str) -> Result<LevelFilter, LoggerError> {
    match level.to_lowercase().as_str() {
        "off" | "none" => Ok(LevelFilter::Off),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        _ => Err(LoggerError::InvalidLevel(level.to_string())),
    }
}

/// `log_2025-01-31_12-00-00.txt` style name stamped with the local time.
pub fn log_file_name() -> String {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("log_{}.txt", date_and_time)
}

/// Installs a terminal logger and, when `to_file` is set, a file logger next to it.
/// Returns the path of the log file if one was created.
pub fn init_logger(level: &str, to_file: bool) -> Result<Option<PathBuf>, LoggerError> {
    let log_option = level_filter(level)?;
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_option,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let mut path = None;
    if to_file && log_option != LevelFilter::Off {
        let name = PathBuf::from(log_file_name());
        loggers.push(WriteLogger::new(
            log_option,
            Config::default(),
            File::create(&name)?,
        ));
        path = Some(name);
    }
    CombinedLogger::init(loggers).map_err(|_| LoggerError::AlreadyInitialised)?;
    Ok(path)
}

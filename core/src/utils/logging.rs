// core/src/utils/logging.rs
use crate::error::ConfigError;
use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs;
use std::path::Path;

pub fn parse_level(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        _ => Err(ConfigError::InvalidLogLevel(level.to_string())),
    }
}

/// Installs the global logger: stderr always, plus `log_path` (appended) when given.
pub fn init(level: LevelFilter, log_path: Option<&Path>) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        // lettre logs every SMTP exchange at debug
        .level_for("lettre", LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Some(path) = log_path {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
            }
        }
        let file = fern::log_file(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().context("Failed to initialize logger")?;
    Ok(())
}

//! Logger setup.

use std::str::FromStr;

use log::LevelFilter;

use crate::config::LogConfig;
use crate::error::{Error, Result};

/// Installs the global logger: local timestamps, level from `config`,
/// stdout plus an optional file. Unknown level strings fall back to `info`.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = parse_level(&config.level);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = &config.file {
        let file = fern::log_file(path).map_err(|source| Error::LogFile {
            path: path.clone(),
            source,
        })?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    log::debug!("Logging initialized at {level}");
    Ok(())
}

pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

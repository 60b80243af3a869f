// Logging setup: log4rs behind the `log` facade, console + file appenders

use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::error::{ResponderError, Result};

const LOG_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S%.3f)}] [{l}] {m}{n}";

/// Parse a level name, falling back to `Info` for anything unknown.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the global logger. Call once, before anything logs.
pub fn init_logging(log_path: &str, level: LevelFilter) -> Result<()> {
    // Create logs directory if it doesn't exist
    if let Some(parent) = Path::new(log_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .append(true)
        .build(log_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(level),
        )
        .map_err(|e| ResponderError::Config(format!("logger config: {e}")))?;

    log4rs::init_config(config)
        .map_err(|e| ResponderError::Config(format!("logger already installed: {e}")))?;

    Ok(())
}

// Convenience macros
#[macro_export]
macro_rules! sys_debug {
    ($($arg:tt)*) => {
        $crate::__log::debug!(target: "llama_responder", $($arg)*)
    };
}

#[macro_export]
macro_rules! sys_info {
    ($($arg:tt)*) => {
        $crate::__log::info!(target: "llama_responder", $($arg)*)
    };
}

#[macro_export]
macro_rules! sys_warn {
    ($($arg:tt)*) => {
        $crate::__log::warn!(target: "llama_responder", $($arg)*)
    };
}

#[macro_export]
macro_rules! sys_error {
    ($($arg:tt)*) => {
        $crate::__log::error!(target: "llama_responder", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level("warning"), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }
}

//! Logging configuration.
//!
//! Precedence, lowest to highest: defaults, `RUST_LOG`, `TSW_LOG`,
//! `TSW_LOG_FORMAT`, then the `--verbose`/`--quiet`/`--log-format`/
//! `--no-color` flags.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const ENV_LEVEL: &str = "TSW_LOG";
const ENV_FORMAT: &str = "TSW_LOG_FORMAT";
const ENV_RUST_LOG: &str = "RUST_LOG";

/// How log events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `fmt` console lines.
    #[default]
    Human,
    /// One JSON object per event.
    Jsonl,
}

impl LogFormat {
    /// Lenient parse for environment values.
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "human" | "pretty" => Some(LogFormat::Human),
            "jsonl" | "json" => Some(LogFormat::Jsonl),
            _ => None,
        }
    }
}

/// Most verbose level that is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "quiet" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Most verbose level named anywhere in a `RUST_LOG` directive list,
    /// e.g. `warn,tsw_store=debug` gives `Debug`.
    fn from_rust_log(directives: &str) -> Option<Self> {
        directives
            .split(',')
            .filter_map(|directive| {
                let level = directive.rsplit('=').next().unwrap_or(directive);
                LogLevel::from_env_value(level)
            })
            .max()
    }

    /// Level for `--quiet` and a `--verbose` count; `None` when neither
    /// flag was given.
    pub fn from_flags(quiet: bool, verbose: u8) -> Option<Self> {
        if quiet {
            return Some(LogLevel::Error);
        }
        match verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Resolved logging settings for one process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,

    /// Allow ANSI colors in human output. Only honored on a terminal.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            color: true,
        }
    }
}

impl LogConfig {
    /// Settings from the environment, with CLI values applied last.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|name| std::env::var(name).ok(), cli_level, cli_format)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = LogConfig::default();

        let env_level = match lookup(ENV_LEVEL) {
            Some(value) => LogLevel::from_env_value(&value),
            None => lookup(ENV_RUST_LOG).and_then(|v| LogLevel::from_rust_log(&v)),
        };
        if let Some(level) = env_level {
            config.level = level;
        }
        if let Some(format) = lookup(ENV_FORMAT).and_then(|v| LogFormat::from_env_value(&v)) {
            config.format = format;
        }

        if let Some(level) = cli_level {
            config.level = level;
        }
        if let Some(format) = cli_format {
            config.format = format;
        }
        config
    }

    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_values() {
        assert_eq!(LogFormat::from_env_value("JSON"), Some(LogFormat::Jsonl));
        assert_eq!(LogFormat::from_env_value("xml"), None);
        assert_eq!(LogLevel::from_env_value("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_env_value("loud"), None);
    }

    #[test]
    fn test_rust_log_directives() {
        assert_eq!(LogLevel::from_rust_log("tsw_core=debug"), Some(LogLevel::Debug));
        assert_eq!(
            LogLevel::from_rust_log("warn,tsw_store=trace"),
            Some(LogLevel::Trace)
        );
        assert_eq!(LogLevel::from_rust_log("tsw_core"), None);
    }

    #[test]
    fn test_tsw_log_beats_rust_log() {
        let config =
            LogConfig::from_lookup(env(&[("TSW_LOG", "warn"), ("RUST_LOG", "trace")]), None, None);
        assert_eq!(config.level, LogLevel::Warn);

        let config = LogConfig::from_lookup(env(&[("RUST_LOG", "debug")]), None, None);
        assert_eq!(config.level, LogLevel::Debug);
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = LogConfig::from_lookup(
            env(&[("TSW_LOG", "trace"), ("TSW_LOG_FORMAT", "human")]),
            Some(LogLevel::Error),
            Some(LogFormat::Jsonl),
        );
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.format, LogFormat::Jsonl);
    }

    #[test]
    fn test_flags() {
        assert_eq!(LogLevel::from_flags(false, 0), None);
        assert_eq!(LogLevel::from_flags(false, 1), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_flags(false, 5), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_flags(true, 2), Some(LogLevel::Error));
        assert!(!LogConfig::default().without_color().color);
    }
}

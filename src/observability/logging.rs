//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when neither config nor `RUST_LOG` set one.
const DEFAULT_LEVEL: &str = "warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to `Pretty`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Optional log file; stderr otherwise.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// `RUST_LOG` wins over the configured level; `verbose` raises the crate
    /// to `debug` when neither is set. `ACTIVITY_GRAPH_LOG_FORMAT` and
    /// `ACTIVITY_GRAPH_LOG_FILE` override the format and file.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = std::env::var("ACTIVITY_GRAPH_LOG_FORMAT")
            .ok()
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .map(|value| LogFormat::parse(&value))
            .unwrap_or_default();

        let file = std::env::var("ACTIVITY_GRAPH_LOG_FILE")
            .ok()
            .or_else(|| settings.and_then(|s| s.file.clone()))
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let level = settings.and_then(|s| s.level.clone());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = match (level, verbose) {
                (_, true) => "activity_graph=debug".to_string(),
                (Some(level), false) => level,
                (None, false) => DEFAULT_LEVEL.to_string(),
            };
            EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
        });

        Self {
            format,
            filter,
            file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", LogFormat::Json ; "json")]
    #[test_case("JSON ", LogFormat::Json ; "case and whitespace")]
    #[test_case("pretty", LogFormat::Pretty ; "pretty")]
    #[test_case("xml", LogFormat::Pretty ; "unknown falls back")]
    fn test_parse_format(input: &str, expected: LogFormat) {
        assert_eq!(LogFormat::parse(input), expected);
    }

    #[test]
    fn test_settings_file_is_used() {
        let settings = LoggingSettings {
            format: None,
            level: Some("info".to_string()),
            file: Some("/tmp/activity-graph.log".to_string()),
        };
        let config = LoggingConfig::from_settings(Some(&settings), false);
        if std::env::var("ACTIVITY_GRAPH_LOG_FILE").is_err() {
            assert_eq!(config.file, Some(PathBuf::from("/tmp/activity-graph.log")));
        }
    }
}

//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! `ACTIVITY_GRAPH_*` environment variables. A `.env` file in the working
//! directory is loaded by the binary before the environment is read.
//!
//! ```toml
//! [graph]
//! url = "http://localhost:7474"
//! database = "neo4j"
//! username = "neo4j"
//! password = "${NEO4J_PASSWORD}"
//! timeout_ms = 30000
//! max_concurrent = 10
//!
//! [service]
//! dry_run = false
//! verbose_queries = false
//!
//! [logging]
//! format = "json"
//! level = "info"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```

use crate::storage::GraphBulkheadConfig;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ACTIVITY_GRAPH_";

/// Main configuration for activity-graph.
#[derive(Debug, Clone, Default)]
pub struct ActivityGraphConfig {
    /// Graph store connection.
    pub graph: GraphStoreConfig,
    /// Service behaviour.
    pub service: ServiceSettings,
    /// Logging section, resolved by `observability`.
    pub logging: LoggingSettings,
    /// Metrics section, resolved by `observability`.
    pub metrics: MetricsSettings,
}

/// Graph store connection settings.
#[derive(Debug, Clone)]
pub struct GraphStoreConfig {
    /// Base URL of the Neo4j HTTP endpoint.
    pub url: String,
    /// Database name.
    pub database: String,
    /// Basic-auth user.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<SecretString>,
    /// Request timeout in milliseconds (0 = no timeout).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 = no timeout).
    pub connect_timeout_ms: u64,
    /// Maximum in-flight queries.
    pub max_concurrent: usize,
    /// Bulkhead permit wait in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: None,
            password: None,
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
            max_concurrent: 10,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl GraphStoreConfig {
    /// Returns the bulkhead settings for this store.
    #[must_use]
    pub const fn bulkhead(&self) -> GraphBulkheadConfig {
        GraphBulkheadConfig::new()
            .with_max_concurrent(self.max_concurrent)
            .with_acquire_timeout_ms(self.acquire_timeout_ms)
    }
}

/// Service behaviour flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Render and log queries without executing them.
    pub dry_run: bool,
    /// Log every rendered query at info level.
    pub verbose_queries: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `info` or `activity_graph=debug`.
    pub level: Option<String>,
    /// Optional log file; logs go to stderr otherwise.
    pub file: Option<String>,
}

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Install the Prometheus recorder.
    pub enabled: Option<bool>,
    /// Exporter listen port.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Graph section.
    pub graph: Option<ConfigFileGraph>,
    /// Service section.
    pub service: Option<ConfigFileService>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// `[graph]` section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileGraph {
    /// Base URL.
    pub url: Option<String>,
    /// Database name.
    pub database: Option<String>,
    /// User name.
    pub username: Option<String>,
    /// Password; supports `${VAR}` references.
    pub password: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Maximum in-flight queries.
    pub max_concurrent: Option<usize>,
    /// Bulkhead permit wait.
    pub acquire_timeout_ms: Option<u64>,
}

/// `[service]` section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileService {
    /// Dry-run mode.
    pub dry_run: Option<bool>,
    /// Verbose query logging.
    pub verbose_queries: Option<bool>,
}

impl ActivityGraphConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from `path`, or the default location when `None`,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be read or parsed, or if a
    /// referenced environment variable is unset.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file, |key| std::env::var(key).ok())
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/.config/activity-graph/` on Linux)
    /// 2. XDG config dir (`~/.config/activity-graph/` on every Unix)
    ///
    /// Returns default configuration if no readable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        for path in default_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                },
            }
        }
        Self::default()
    }

    /// Applies `ACTIVITY_GRAPH_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override does not parse.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = var("URL") {
            self.graph.url = url;
        }
        if let Some(database) = var("DATABASE") {
            self.graph.database = database;
        }
        if let Some(username) = var("USERNAME") {
            self.graph.username = Some(username);
        }
        if let Some(password) = var("PASSWORD") {
            self.graph.password = Some(SecretString::from(password));
        }
        if let Some(value) = var("TIMEOUT_MS") {
            self.graph.timeout_ms = parse_number("TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("CONNECT_TIMEOUT_MS") {
            self.graph.connect_timeout_ms = parse_number("CONNECT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("MAX_CONCURRENT") {
            self.graph.max_concurrent = parse_number("MAX_CONCURRENT", &value)?;
        }
        if let Some(value) = var("ACQUIRE_TIMEOUT_MS") {
            self.graph.acquire_timeout_ms = parse_number("ACQUIRE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("DRY_RUN") {
            self.service.dry_run = parse_bool(&value);
        }
        if let Some(value) = var("VERBOSE_QUERIES") {
            self.service.verbose_queries = parse_bool(&value);
        }

        Ok(self)
    }

    /// Converts a `ConfigFile` to `ActivityGraphConfig`.
    fn from_config_file(file: ConfigFile, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(graph) = file.graph {
            if let Some(url) = graph.url {
                config.graph.url = url;
            }
            if let Some(database) = graph.database {
                config.graph.database = database;
            }
            config.graph.username = graph.username;
            if let Some(password) = graph.password {
                config.graph.password =
                    Some(SecretString::from(expand_env_vars(&password, &lookup)?));
            }
            if let Some(v) = graph.timeout_ms {
                config.graph.timeout_ms = v;
            }
            if let Some(v) = graph.connect_timeout_ms {
                config.graph.connect_timeout_ms = v;
            }
            if let Some(v) = graph.max_concurrent {
                config.graph.max_concurrent = v;
            }
            if let Some(v) = graph.acquire_timeout_ms {
                config.graph.acquire_timeout_ms = v;
            }
        }
        if let Some(service) = file.service {
            if let Some(v) = service.dry_run {
                config.service.dry_run = v;
            }
            if let Some(v) = service.verbose_queries {
                config.service.verbose_queries = v;
            }
        }
        config.logging = file.logging.unwrap_or_default();
        config.metrics = file.metrics.unwrap_or_default();

        Ok(config)
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.service.dry_run = dry_run;
        self
    }

    /// Returns the effective configuration as JSON with the password redacted.
    #[must_use]
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "graph": {
                "url": self.graph.url,
                "database": self.graph.database,
                "username": self.graph.username,
                "password": self.graph.password.as_ref().map(|p| {
                    if p.expose_secret().is_empty() { "" } else { "***" }
                }),
                "timeout_ms": self.graph.timeout_ms,
                "connect_timeout_ms": self.graph.connect_timeout_ms,
                "max_concurrent": self.graph.max_concurrent,
                "acquire_timeout_ms": self.graph.acquire_timeout_ms,
            },
            "service": {
                "dry_run": self.service.dry_run,
                "verbose_queries": self.service.verbose_queries,
            },
            "logging": {
                "format": self.logging.format,
                "level": self.logging.level,
                "file": self.logging.file,
            },
            "metrics": {
                "enabled": self.metrics.enabled,
                "port": self.metrics.port,
            },
        })
    }
}

/// Candidate config file locations, in lookup order.
#[must_use]
pub fn default_paths() -> Vec<PathBuf> {
    let Some(base_dirs) = directories::BaseDirs::new() else {
        return Vec::new();
    };
    let platform = base_dirs.config_dir().join("activity-graph").join("config.toml");
    let xdg = base_dirs
        .home_dir()
        .join(".config")
        .join("activity-graph")
        .join("config.toml");
    if platform == xdg {
        vec![platform]
    } else {
        vec![platform, xdg]
    }
}

static ENV_REFERENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

/// Expands `${VAR}` references in `value`.
///
/// # Errors
///
/// Returns an error naming the first unset variable.
pub fn expand_env_vars(value: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let Some(pattern) = ENV_REFERENCE.as_ref() else {
        return Ok(value.to_string());
    };

    let mut expanded = String::with_capacity(value.len());
    let mut last = 0;
    for captures in pattern.captures_iter(value) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let resolved = lookup(name.as_str()).ok_or_else(|| Error::OperationFailed {
            operation: "expand_env_var".to_string(),
            cause: format!("environment variable {} is not set", name.as_str()),
        })?;
        expanded.push_str(&value[last..whole.start()]);
        expanded.push_str(&resolved);
        last = whole.end();
    }
    expanded.push_str(&value[last..]);
    Ok(expanded)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::OperationFailed {
        operation: "parse_env_override".to_string(),
        cause: format!("{ENV_PREFIX}{name} is not a number: {value}"),
    })
}

//! Application configuration.
//!
//! Settings are read through an injectable key lookup, so the same code path
//! serves the process environment in production and a plain map in tests.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use thiserror::Error;
use url::Url;

use crate::SERVICE_NAME;

/// Environment variable holding the PostgreSQL connection URI.
pub const DB_URI_VAR: &str = "DB_URI";

const HOST_VAR: &str = "HOST";
const PORT_VAR: &str = "PORT";
const MAX_CONNECTIONS_VAR: &str = "DB_MAX_CONNECTIONS";
const CONNECT_TIMEOUT_VAR: &str = "DB_CONNECT_TIMEOUT_SECS";
const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_PG_PORT: u16 = 5432;

/// Startup configuration errors. None of these are recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {0} is empty")]
    EmptyVar(&'static str),

    #[error("invalid database URI: {0}")]
    InvalidUri(String),

    #[error("unsupported database URI scheme '{0}' (expected postgres or postgresql)")]
    UnsupportedScheme(String),

    #[error("database URI has no host")]
    MissingHost,

    #[error("database URI has no database name")]
    MissingDatabase,

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Validated PostgreSQL connection descriptor.
///
/// Accepts `postgres://`, `postgresql://` and driver-qualified schemes such as
/// `postgresql+asyncpg://`; all of them are normalised to `postgres://`.
#[derive(Clone)]
pub struct DatabaseConfig {
    url: Url,
    options: PgConnectOptions,
}

impl DatabaseConfig {
    /// Parses and validates a connection URI. Never touches the network.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::EmptyVar(DB_URI_VAR));
        }

        let mut url = Url::parse(raw).map_err(|e| ConfigError::InvalidUri(e.to_string()))?;

        let scheme = url.scheme().to_string();
        let recognised = scheme == "postgres"
            || scheme == "postgresql"
            || scheme.starts_with("postgresql+");
        if !recognised {
            return Err(ConfigError::UnsupportedScheme(scheme));
        }
        if scheme != "postgres" {
            url.set_scheme("postgres")
                .map_err(|_| ConfigError::InvalidUri(format!("cannot normalise scheme '{}'", scheme)))?;
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingHost);
        }
        if url.path().trim_start_matches('/').is_empty() {
            return Err(ConfigError::MissingDatabase);
        }

        let options = PgConnectOptions::from_str(url.as_str())
            .map_err(|e| ConfigError::InvalidUri(e.to_string()))?
            .application_name(SERVICE_NAME);

        Ok(Self { url, options })
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or(DEFAULT_PG_PORT)
    }

    pub fn username(&self) -> Option<&str> {
        Some(self.url.username()).filter(|u| !u.is_empty())
    }

    pub fn has_password(&self) -> bool {
        self.url.password().is_some()
    }

    pub fn database(&self) -> &str {
        self.url.path().trim_start_matches('/')
    }

    /// Connection options ready to hand to a pool builder.
    pub fn connect_options(&self) -> PgConnectOptions {
        self.options.clone()
    }

    /// The normalised URI with the password masked, safe to log.
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.to_string()
    }
}

impl PartialEq for DatabaseConfig {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for DatabaseConfig {}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host())
            .field("port", &self.port())
            .field("username", &self.username())
            .field("password", &self.has_password().then_some("***"))
            .field("database", &self.database())
            .finish()
    }
}

/// Application configuration, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind host for the HTTP listener.
    pub host: String,
    /// Bind port for the HTTP listener.
    pub port: u16,
    /// Validated database descriptor from `DB_URI`.
    pub database: DatabaseConfig,
    /// Upper bound on pooled database connections.
    pub max_connections: u32,
    /// Time allowed for establishing a database connection.
    pub connect_timeout_secs: u64,
    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// `DB_URI` is validated first; a missing or malformed URI fails before
    /// anything else is read.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_uri = lookup(DB_URI_VAR).ok_or(ConfigError::MissingVar(DB_URI_VAR))?;
        let database = DatabaseConfig::parse(&raw_uri)?;

        let host = lookup(HOST_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&lookup, PORT_VAR, DEFAULT_PORT)?;

        let max_connections = parse_or(&lookup, MAX_CONNECTIONS_VAR, DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: MAX_CONNECTIONS_VAR,
                value: "0".to_string(),
            });
        }

        let connect_timeout_secs =
            parse_or(&lookup, CONNECT_TIMEOUT_VAR, DEFAULT_CONNECT_TIMEOUT_SECS)?;
        if connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: CONNECT_TIMEOUT_VAR,
                value: "0".to_string(),
            });
        }

        let log_format = parse_or(&lookup, LOG_FORMAT_VAR, LogFormat::default())?;

        Ok(Self {
            host,
            port,
            database,
            max_connections,
            connect_timeout_secs,
            log_format,
        })
    }

    /// Builds a configuration around an already validated descriptor, with defaults elsewhere.
    pub fn with_database(database: DatabaseConfig) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_format: LogFormat::default(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        _ => Ok(default),
    }
}

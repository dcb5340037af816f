//! Sink configuration
//!
//! YAML configuration with `${VAR}` / `${VAR:-default}` environment expansion,
//! validated with `validator` and documented through `schemars`.
//!
//! ```yaml
//! host: db.local
//! user: ulog
//! password: ${ULOG_DB_PASSWORD}
//! database: nulog
//! table: ulog
//! reconnect: 30
//! connect_timeout: 10
//! ```

use schemars::JsonSchema;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::connection::{ConnectOptions, DEFAULT_PORT};
use crate::error::{Error, Result};
use crate::manager::ReconnectPolicy;
use crate::security::validate_sql_identifier;
use crate::types::ValueKind;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// A string that is redacted in Debug, Display and Serialize output
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Create a new sensitive string from any string-like value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Use sparingly - only when the actual value is needed (e.g., for authentication).
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Serialize as redacted to prevent accidental exposure in config dumps/logs
impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

impl JsonSchema for SensitiveString {
    fn schema_name() -> String {
        "SensitiveString".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = gen.subschema_for::<String>();
        if let schemars::schema::Schema::Object(obj) = &mut schema {
            obj.format = Some("password".to_string());
            obj.metadata().description =
                Some("Sensitive value, redacted in logs and config dumps.".to_string());
        }
        schema
    }
}

/// How IPv4 addresses are written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpEncoding {
    /// Unquoted 32-bit unsigned integer
    #[default]
    Integer,
    /// Quoted dotted quad, used only for string columns
    String,
}

/// What to do with values the sink cannot encode (raw bytes, unknown types)
///
/// The default is [`Reject`](Self::Reject). Earlier MySQL output plugins
/// behaved like [`Omit`](Self::Omit); set `unsupported_values: omit` to keep
/// that behaviour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedValuePolicy {
    /// Append nothing for the column. The value list then no longer matches
    /// the column list and the server rejects the statement.
    Omit,
    /// Write `NULL` for the column
    Null,
    /// Refuse the whole record before anything is sent
    #[default]
    Reject,
}

/// MySQL sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct SinkConfig {
    /// Server host name or address
    #[validate(length(min = 1))]
    pub host: String,

    /// Server port (default: 3306)
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// User name
    #[validate(length(min = 1))]
    pub user: String,

    /// Password
    pub password: SensitiveString,

    /// Database (schema) holding the table
    #[validate(length(min = 1))]
    pub database: String,

    /// Target table; its columns decide which keys are logged
    #[validate(custom(function = "validate_table_name"))]
    pub table: String,

    /// Seconds between reconnect attempts. Absent or 0 disables the sink
    /// after the first failed connect.
    #[serde(default)]
    pub reconnect: Option<u64>,

    /// Upper bound in seconds for establishing a connection
    #[serde(default)]
    #[validate(range(min = 1, max = 3600))]
    pub connect_timeout: Option<u64>,

    /// IPv4 address encoding
    #[serde(default)]
    pub ip_encoding: IpEncoding,

    /// Handling of values that cannot be written as SQL literals
    #[serde(default)]
    pub unsupported_values: UnsupportedValuePolicy,

    /// Typed keys the command-line host registers for `ingest`/`check`
    #[serde(default)]
    pub keys: BTreeMap<String, ValueKind>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn validate_table_name(table: &str) -> std::result::Result<(), ValidationError> {
    validate_sql_identifier(table).map_err(|e| {
        let mut err = ValidationError::new("sql_identifier");
        err.message = Some(e.to_string().into());
        err
    })
}

impl SinkConfig {
    /// Minimal configuration with defaults for every optional setting
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: SensitiveString::new(password),
            database: database.into(),
            table: table.into(),
            reconnect: None,
            connect_timeout: None,
            ip_encoding: IpEncoding::default(),
            unsupported_values: UnsupportedValuePolicy::default(),
            keys: BTreeMap::new(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;

        config.check()?;
        Ok(config)
    }

    /// Run field validation, mapping failures to a configuration error
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("Validation failed: {}", e)))
    }

    /// Retry policy after connect failures
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        match self.reconnect {
            Some(secs) if secs > 0 => ReconnectPolicy::Every(Duration::from_secs(secs)),
            _ => ReconnectPolicy::Disabled,
        }
    }

    /// Options for opening connections
    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(
            self.host.clone(),
            self.user.clone(),
            self.password.expose_secret(),
            self.database.clone(),
        )
        .with_port(self.port);
        if let Some(secs) = self.connect_timeout {
            options = options.with_connect_timeout(Duration::from_secs(secs));
        }
        options
    }
}

/// Expand environment variables in the format ${VAR} or ${VAR:-default}
pub fn expand_env_vars(content: &str) -> String {
    ENV_VAR_REGEX
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .to_string()
}

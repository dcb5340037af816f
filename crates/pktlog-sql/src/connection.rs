//! Connection traits for pktlog-sql
//!
//! Core abstractions for database connectivity:
//! - Connection: metadata lookup and literal statement execution
//! - ConnectionFactory: opens connections from [`ConnectOptions`]
//!
//! The sink only ever sends complete SQL text, so there is no parameter
//! binding, transaction or streaming surface here.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::types::ColumnMetadata;

/// Default MySQL server port
pub const DEFAULT_PORT: u16 = 3306;

/// A connection to a database
#[async_trait]
pub trait Connection: Send + Sync {
    /// List the columns of a table in the current database, in native order.
    ///
    /// Fails with a schema error when the table does not exist.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>>;

    /// Execute a statement that modifies data, returns affected row count
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// SQL dialect spoken by this connection
    fn dialect(&self) -> &dyn SqlDialect;

    /// Escape a string for a single-quoted literal on this connection
    fn escape(&self, raw: &str) -> String {
        self.dialect().escape_string(raw)
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Factory for creating connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Create a new connection
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>>;
}

/// Options for opening a connection
#[derive(Clone)]
pub struct ConnectOptions {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// User name
    pub user: String,
    /// Password
    pub password: SecretString,
    /// Database (schema) to select
    pub database: String,
    /// Upper bound for establishing the connection (None = driver default)
    pub connect_timeout: Option<Duration>,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***REDACTED***")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ConnectOptions {
    /// Create options for `user@host/database` on the default port
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        let password: String = password.into();
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: SecretString::new(password.into_boxed_str()),
            database: database.into(),
            connect_timeout: None,
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Expose the password to a driver
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// `host:port/database` for diagnostics
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_builder() {
        let opts = ConnectOptions::new("db.local", "ulog", "s3cret", "nf")
            .with_port(3307)
            .with_connect_timeout(Duration::from_secs(5));

        assert_eq!(opts.port, 3307);
        assert_eq!(opts.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.password(), "s3cret");
        assert_eq!(opts.target(), "db.local:3307/nf");
    }

    #[test]
    fn test_connect_options_debug_redacts_password() {
        let opts = ConnectOptions::new("db.local", "ulog", "s3cret", "nf");
        let debug = format!("{:?}", opts);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("db.local"));
    }

    #[test]
    fn test_default_port() {
        let opts = ConnectOptions::new("h", "u", "p", "d");
        assert_eq!(opts.port, 3306);
        assert!(opts.connect_timeout.is_none());
    }
}

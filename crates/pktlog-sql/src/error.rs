//! Error types for pktlog-sql
//!
//! Errors are classified so the connection manager can decide how to recover:
//! - Connection, schema and capacity failures feed the reconnect policy
//! - Execution failures trigger an immediate inline reconnect
//! - Configuration and value errors are never retried

use std::fmt;
use thiserror::Error;

/// Result type for pktlog-sql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Handle open, authentication or transport failure (retriable)
    Connection,
    /// Connect attempt exceeded its deadline (retriable)
    Timeout,
    /// Table missing, undescribable, or without usable columns (retriable)
    Schema,
    /// Statement buffer could not be reserved or would overflow (retriable)
    Capacity,
    /// Statement rejected by the server or connection lost mid-query
    Execution,
    /// A record carried a value this sink cannot encode
    Value,
    /// Invalid or missing setting
    Configuration,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Timeout | Self::Schema | Self::Capacity | Self::Execution
        )
    }
}

/// Main error type for pktlog-sql
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connect attempt timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Schema error (column listing failed, no usable columns)
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Table not found
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    /// Statement buffer allocation failed
    #[error("out of memory: unable to reserve {requested} bytes for statement")]
    OutOfMemory { requested: usize },

    /// Append would exceed the statement buffer capacity
    #[error("statement capacity exceeded: need {needed} bytes, {remaining} remaining")]
    Capacity { needed: usize, remaining: usize },

    /// Statement execution failed
    #[error("execution error: {message}")]
    Execution {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Value kind not supported by the sink
    #[error("unsupported value for {key}: {kind}")]
    UnsupportedValue { key: String, kind: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Schema { .. } | Self::TableNotFound { .. } => ErrorCategory::Schema,
            Self::OutOfMemory { .. } | Self::Capacity { .. } => ErrorCategory::Capacity,
            Self::Execution { .. } => ErrorCategory::Execution,
            Self::UnsupportedValue { .. } => ErrorCategory::Value,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a table-not-found error
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Create a capacity error
    pub fn capacity(needed: usize, remaining: usize) -> Self {
        Self::Capacity { needed, remaining }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create an execution error carrying the failed statement
    pub fn execution_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create an unsupported value error
    pub fn unsupported_value(key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            key: key.into(),
            kind: kind.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::Schema => write!(f, "schema"),
            Self::Capacity => write!(f, "capacity"),
            Self::Execution => write!(f, "execution"),
            Self::Value => write!(f, "value"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retriable() {
        assert!(ErrorCategory::Connection.is_retriable());
        assert!(ErrorCategory::Timeout.is_retriable());
        assert!(ErrorCategory::Schema.is_retriable());
        assert!(ErrorCategory::Capacity.is_retriable());
        assert!(ErrorCategory::Execution.is_retriable());

        assert!(!ErrorCategory::Configuration.is_retriable());
        assert!(!ErrorCategory::Value.is_retriable());
        assert!(!ErrorCategory::Other.is_retriable());
    }

    #[test]
    fn test_table_not_found_is_schema() {
        let err = Error::table_not_found("ulog");
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert!(err.to_string().contains("ulog"));
    }

    #[test]
    fn test_out_of_memory_is_capacity() {
        let err = Error::OutOfMemory { requested: 4096 };
        assert_eq!(err.category(), ErrorCategory::Capacity);
        assert!(err.is_retriable());
        assert!(err.to_string().contains("4096"));
    }

    #[test]
    fn test_error_display() {
        let err = Error::connection("connection refused");
        assert!(err.to_string().contains("connection refused"));

        let err = Error::execution_with_sql("syntax error", "INSERT INTO ulog (a) VALUES (");
        assert!(err.to_string().contains("syntax error"));
    }
}

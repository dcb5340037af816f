//! # pktlog-sql
//!
//! Schema-driven MySQL output for packet log records.
//!
//! The sink discovers the target table's columns at connect time, matches
//! them against the host's key registry (`ip_saddr` is fed by `ip.saddr`) and
//! writes one literal `INSERT` per record. Lost or never-established
//! connections are recovered without involving the host.
//!
//! ## Features
//!
//! - **Schema discovery**: the table decides which keys are logged
//! - **Bounded statements**: the statement buffer is sized once per connect
//!   and never grows; oversized strings degrade to `''`
//! - **Escaping**: MySQL string literal rules for every string value
//! - **Recovery**: inline reconnect on execution errors, timed retries or
//!   permanent disable on connect errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pktlog_sql::prelude::*;
//!
//! let config = SinkConfig::from_file("pktlog-sql.yaml")?;
//!
//! let mut keys = KeyTable::new();
//! keys.register("ip.saddr", ValueKind::IpAddr);
//! keys.register("oob.prefix", ValueKind::String);
//!
//! let mut output = OutputDispatcher::mysql(&config)?;
//! output.start(&keys).await?;
//!
//! keys.set_by_name("ip.saddr", Some(Value::IpAddr(0x0a00_0001)))?;
//! output.output(&keys).await?;
//!
//! output.shutdown().await;
//! ```
//!
//! ## Feature Flags
//!
//! - `mysql` (default) - MySQL/MariaDB backend via mysql_async

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod dialect;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod manager;
pub mod registry;
pub mod schema;
pub mod security;
pub mod statement;
pub mod stats;
pub mod testing;
pub mod types;

#[cfg(feature = "mysql")]
pub mod mysql;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Values and the key registry
    pub use crate::registry::{KeyId, KeyRegistry, KeyTable};
    pub use crate::types::{ColumnMetadata, KeyResult, Value, ValueKind};

    // Configuration
    pub use crate::config::{IpEncoding, SensitiveString, SinkConfig, UnsupportedValuePolicy};

    // Connection traits
    pub use crate::connection::{ConnectOptions, Connection, ConnectionFactory};
    pub use crate::dialect::{dialect_for, MySqlDialect, SqlDialect};

    // Statement pipeline
    pub use crate::encoder::ValueEncoder;
    pub use crate::schema::{Field, SchemaIntrospector};
    pub use crate::statement::{InsertStatement, StatementBuilder, VALUE_RESERVE};

    // Recovery and dispatch
    pub use crate::dispatcher::{Delivery, OutputDispatcher};
    pub use crate::manager::{ConnectionManager, ConnectionState, DispatchMode, ReconnectPolicy};
    pub use crate::stats::{AtomicSinkStats, SinkStats};

    #[cfg(feature = "mysql")]
    pub use crate::mysql::{MySqlConnection, MySqlConnectionFactory};
}

// Re-export commonly used items at crate root
pub use dispatcher::{Delivery, OutputDispatcher};
pub use error::{Error, Result};
pub use types::Value;

//! MySQL backend implementation for pktlog-sql
//!
//! Provides MySQL-specific implementations:
//! - Connection with column introspection and literal statement execution
//! - String escaping that follows the server's `NO_BACKSLASH_ESCAPES` mode
//! - Connection factory honouring the configured connect timeout

use async_trait::async_trait;
use mysql_async::consts::StatusFlags;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::{ConnectOptions, Connection, ConnectionFactory};
use crate::dialect::{MySqlDialect, SqlDialect};
use crate::error::{Error, Result};
use crate::security::escape_for_sql_mode;
use crate::types::ColumnMetadata;

fn no_backslash_escapes(conn: &Conn) -> bool {
    conn.status()
        .contains(StatusFlags::SERVER_STATUS_NO_BACKSLASH_ESCAPES)
}

/// MySQL connection implementation
pub struct MySqlConnection {
    conn: Arc<Mutex<Option<Conn>>>,
    database: String,
    dialect: MySqlDialect,
    no_backslash_escapes: AtomicBool,
}

impl MySqlConnection {
    /// Get the database name this connection is connected to
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Create a new MySQL connection from an existing connection
    pub fn new(conn: Conn, database: String) -> Self {
        let no_backslash = no_backslash_escapes(&conn);
        if no_backslash {
            debug!(database = %database, "server runs with NO_BACKSLASH_ESCAPES");
        }
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            database,
            dialect: MySqlDialect,
            no_backslash_escapes: AtomicBool::new(no_backslash),
        }
    }

    /// Whether the server last reported `NO_BACKSLASH_ESCAPES`
    pub fn no_backslash_escapes(&self) -> bool {
        self.no_backslash_escapes.load(Ordering::Relaxed)
    }

    /// Open a new connection from options
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(options.host.clone())
            .tcp_port(options.port)
            .user(Some(options.user.clone()))
            .pass(Some(options.password().to_owned()))
            .db_name(Some(options.database.clone()));

        let connecting = Conn::new(opts);
        let conn = match options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| {
                    Error::timeout(format!(
                        "connect to {} did not complete within {:?}",
                        options.target(),
                        limit
                    ))
                })?,
            None => connecting.await,
        }
        .map_err(|e| Error::connection_with_source("Failed to connect to MySQL", e))?;

        Ok(Self::new(conn, options.database.clone()))
    }

    /// Take the inner connection
    async fn take_conn(&self) -> Option<Conn> {
        let mut guard = self.conn.lock().await;
        guard.take()
    }

    /// Put back the connection, refreshing the cached SQL mode
    async fn put_conn(&self, conn: Conn) {
        self.no_backslash_escapes
            .store(no_backslash_escapes(&conn), Ordering::Relaxed);
        let mut guard = self.conn.lock().await;
        *guard = Some(conn);
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let mut conn = self
            .take_conn()
            .await
            .ok_or_else(|| Error::connection("Connection not available"))?;

        let sql = self.dialect.list_columns_sql(table);
        let rows: Vec<(String, String)> = conn
            .query(sql.as_str())
            .await
            .map_err(|e| Error::connection_with_source("Failed to list columns", e))?;

        self.put_conn(conn).await;

        if rows.is_empty() {
            return Err(Error::table_not_found(format!("{}.{}", self.database, table)));
        }

        let columns = rows
            .into_iter()
            .enumerate()
            .map(|(idx, (name, data_type))| {
                let data_type = data_type.to_lowercase();
                let numeric = self.dialect.is_numeric_type(&data_type);
                ColumnMetadata::new(name, data_type, numeric).with_ordinal(idx as u32 + 1)
            })
            .collect();

        Ok(columns)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut conn = self
            .take_conn()
            .await
            .ok_or_else(|| Error::execution("Connection not available"))?;

        // A failed query leaves the handle out of the slot; the caller
        // replaces the whole connection on execution errors.
        conn.query_drop(sql).await.map_err(|e| Error::Execution {
            message: format!("Failed to execute statement: {}", e),
            sql: Some(sql.to_owned()),
            source: Some(Box::new(e)),
        })?;

        let affected = conn.affected_rows();
        self.put_conn(conn).await;

        Ok(affected)
    }

    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    fn escape(&self, raw: &str) -> String {
        escape_for_sql_mode(raw, self.no_backslash_escapes())
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.take_conn().await {
            conn.disconnect()
                .await
                .map_err(|e| Error::connection(format!("Failed to close connection: {}", e)))?;
            debug!(database = %self.database, "MySQL connection closed");
        }
        Ok(())
    }
}

/// MySQL connection factory
#[derive(Debug, Clone, Default)]
pub struct MySqlConnectionFactory;

impl MySqlConnectionFactory {
    /// Create a new MySQL connection factory
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for MySqlConnectionFactory {
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>> {
        let conn = MySqlConnection::connect(options).await?;
        Ok(Box::new(conn))
    }
}

//! Testing utilities
//!
//! A scripted in-memory database for exercising the connection manager and
//! the dispatcher without a MySQL server.
//!
//! # Example
//!
//! ```rust,ignore
//! use pktlog_sql::testing::MockDatabase;
//!
//! let db = MockDatabase::with_columns(&[("ip_saddr", "int"), ("oob_prefix", "varchar")]);
//! db.fail_next_connects(1);
//!
//! let mut dispatcher = OutputDispatcher::new(&config, db.factory())?;
//! dispatcher.start(&keys).await.unwrap_err();
//! assert_eq!(db.connect_count(), 1);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::connection::{ConnectOptions, Connection, ConnectionFactory};
use crate::dialect::{MySqlDialect, SqlDialect};
use crate::error::{Error, Result};
use crate::security::escape_for_sql_mode;
use crate::types::ColumnMetadata;

#[derive(Debug, Default)]
struct MockState {
    columns: Vec<ColumnMetadata>,
    connect_failures: usize,
    list_failures: usize,
    execute_script: VecDeque<bool>,
    executed: Vec<String>,
    attempted: Vec<String>,
    connects: usize,
    closes: usize,
    no_backslash_escapes: bool,
}

/// Scripted database shared by every connection it hands out
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabase {
    /// Database whose table has the given columns
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        let db = Self::default();
        db.state.lock().columns = columns;
        db
    }

    /// Database whose table has `(name, data_type)` columns, in order
    pub fn with_columns(columns: &[(&str, &str)]) -> Self {
        let dialect = MySqlDialect;
        Self::new(
            columns
                .iter()
                .enumerate()
                .map(|(idx, (name, data_type))| {
                    ColumnMetadata::new(*name, *data_type, dialect.is_numeric_type(data_type))
                        .with_ordinal(idx as u32 + 1)
                })
                .collect(),
        )
    }

    /// Replace the table's columns (applies to the next introspection)
    pub fn set_columns(&self, columns: Vec<ColumnMetadata>) {
        self.state.lock().columns = columns;
    }

    /// Run the server with or without `NO_BACKSLASH_ESCAPES`
    pub fn set_no_backslash_escapes(&self, enabled: bool) {
        self.state.lock().no_backslash_escapes = enabled;
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().connect_failures += n;
    }

    /// Make the next `n` column listings fail
    pub fn fail_next_list_columns(&self, n: usize) {
        self.state.lock().list_failures += n;
    }

    /// Make the next `n` statement executions fail
    pub fn fail_next_executes(&self, n: usize) {
        self.state.lock().execute_script.extend(std::iter::repeat(false).take(n));
    }

    /// Queue execution outcomes (`true` = success)
    pub fn script_executes(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.state.lock().execute_script.extend(outcomes);
    }

    /// Statements executed successfully
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Every statement sent, including failed ones
    pub fn attempted(&self) -> Vec<String> {
        self.state.lock().attempted.clone()
    }

    /// Connect attempts seen by the factory
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Connections closed
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// A connection to this database, bypassing the connect script
    pub fn connection(&self) -> MockConnection {
        MockConnection {
            db: self.clone(),
            dialect: MySqlDialect,
            closed: AtomicBool::new(false),
        }
    }

    /// Factory handing out connections to this database
    pub fn factory(&self) -> Arc<dyn ConnectionFactory> {
        Arc::new(MockConnectionFactory { db: self.clone() })
    }
}

/// Connection to a [`MockDatabase`]
#[derive(Debug)]
pub struct MockConnection {
    db: MockDatabase,
    dialect: MySqlDialect,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::connection("connection closed"));
        }
        let mut state = self.db.state.lock();
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(Error::schema(format!("cannot describe table '{}'", table)));
        }
        if state.columns.is_empty() {
            return Err(Error::table_not_found(table));
        }
        Ok(state.columns.clone())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::execution("connection closed"));
        }
        let mut state = self.db.state.lock();
        state.attempted.push(sql.to_owned());
        if state.execute_script.pop_front() == Some(false) {
            return Err(Error::execution_with_sql("scripted execution failure", sql));
        }
        state.executed.push(sql.to_owned());
        Ok(1)
    }

    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    fn escape(&self, raw: &str) -> String {
        let no_backslash = self.db.state.lock().no_backslash_escapes;
        escape_for_sql_mode(raw, no_backslash)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.db.state.lock().closes += 1;
        }
        Ok(())
    }
}

/// Factory for [`MockConnection`]s
#[derive(Debug, Clone)]
pub struct MockConnectionFactory {
    db: MockDatabase,
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>> {
        {
            let mut state = self.db.state.lock();
            state.connects += 1;
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(Error::connection(format!(
                    "scripted connect failure to {}",
                    options.target()
                )));
            }
        }
        Ok(Box::new(self.db.connection()))
    }
}

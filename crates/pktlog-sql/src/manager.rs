//! Connection manager
//!
//! Owns the database handle together with the field list and INSERT
//! statement derived from it, and drives the recovery state machine:
//!
//! ```text
//!                 connect ok
//!   Disconnected ─────────────▶ Connected
//!     │  ▲    ▲                    │
//!     │  │    └── execution error ─┘ (reconnect inline)
//!     │  └── deadline reached ─┐
//!     │ connect failed         │
//!     └──────────────▶ WaitingToRetry(retry_at)
//! ```
//!
//! Without a reconnect interval a failed connect disables the sink for good.
//! Deadlines are checked lazily, when a record arrives. Shutdown is final:
//! a shut down manager never opens another handle.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::connection::{ConnectOptions, Connection, ConnectionFactory};
use crate::error::{Error, Result};
use crate::registry::KeyRegistry;
use crate::schema::{Field, SchemaIntrospector};
use crate::statement::{InsertStatement, StatementBuilder};
use crate::stats::AtomicSinkStats;

/// What to do after a failed connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Disable the sink permanently
    Disabled,
    /// Try again once the interval has elapsed
    Every(Duration),
}

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No handle
    Disconnected,
    /// Handle open, fields and statement ready
    Connected,
    /// No handle, next attempt not before `retry_at`
    WaitingToRetry {
        /// Earliest instant of the next connect attempt
        retry_at: Instant,
    },
}

/// Behaviour of the next output call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Render and execute
    Insert,
    /// Connect first, then insert
    Reconnect,
    /// Waiting for the retry deadline; drop the record quietly
    Idle,
    /// Sink disabled; drop every record
    Disabled,
}

/// Open handle and the statement built for it
pub(crate) struct Session {
    pub(crate) conn: Box<dyn Connection>,
    pub(crate) statement: InsertStatement,
}

enum Link {
    Down { disabled: bool },
    Up(Session),
    Waiting { retry_at: Instant },
    Closed,
}

/// Owns the database handle and its recovery state
pub struct ConnectionManager {
    factory: Arc<dyn ConnectionFactory>,
    options: ConnectOptions,
    table: String,
    policy: ReconnectPolicy,
    link: Link,
    stats: Arc<AtomicSinkStats>,
}

impl ConnectionManager {
    /// Create a disconnected manager
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        options: ConnectOptions,
        table: impl Into<String>,
        policy: ReconnectPolicy,
        stats: Arc<AtomicSinkStats>,
    ) -> Self {
        Self {
            factory,
            options,
            table: table.into(),
            policy,
            link: Link::Down { disabled: false },
            stats,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        match &self.link {
            Link::Down { .. } | Link::Closed => ConnectionState::Disconnected,
            Link::Up(_) => ConnectionState::Connected,
            Link::Waiting { retry_at } => ConnectionState::WaitingToRetry {
                retry_at: *retry_at,
            },
        }
    }

    /// Behaviour for a record arriving now
    pub fn mode(&self) -> DispatchMode {
        match &self.link {
            Link::Up(_) => DispatchMode::Insert,
            Link::Down { disabled: true } | Link::Closed => DispatchMode::Disabled,
            Link::Down { disabled: false } => DispatchMode::Reconnect,
            Link::Waiting { retry_at } if Instant::now() < *retry_at => DispatchMode::Idle,
            Link::Waiting { .. } => DispatchMode::Reconnect,
        }
    }

    /// Whether the sink gave up for good
    pub fn is_disabled(&self) -> bool {
        matches!(self.link, Link::Down { disabled: true })
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_closed(&self) -> bool {
        matches!(self.link, Link::Closed)
    }

    /// Retry policy
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Target table
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields of the open session
    pub fn fields(&self) -> Option<&[Field]> {
        match &self.link {
            Link::Up(session) => Some(session.statement.fields()),
            _ => None,
        }
    }

    /// Statement prefix of the open session
    pub fn prefix(&self) -> Option<&str> {
        match &self.link {
            Link::Up(session) => Some(session.statement.prefix()),
            _ => None,
        }
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut Session> {
        match &mut self.link {
            Link::Up(session) => Some(session),
            _ => None,
        }
    }

    /// Open a handle, introspect the table and build the statement.
    ///
    /// Any open session is dropped first. On failure the reconnect policy is
    /// applied and the error returned. Fails without side effects once the
    /// manager is shut down.
    pub async fn connect(&mut self, registry: &dyn KeyRegistry) -> Result<()> {
        if self.is_closed() {
            return Err(Error::internal("database output already shut down"));
        }
        self.drop_connection().await;
        self.stats.record_connect_attempt();

        match self.open(registry).await {
            Ok(session) => {
                info!(
                    target_db = %self.options.target(),
                    table = %self.table,
                    fields = session.statement.fields().len(),
                    "connected to database"
                );
                self.link = Link::Up(session);
                Ok(())
            }
            Err(e) => {
                self.stats.record_connect_failure();
                error!(
                    target_db = %self.options.target(),
                    table = %self.table,
                    error = %e,
                    "can't establish database connection"
                );
                self.apply_policy();
                Err(e)
            }
        }
    }

    async fn open(&self, registry: &dyn KeyRegistry) -> Result<Session> {
        let conn = self.factory.connect(&self.options).await?;

        let prepared = match SchemaIntrospector::discover(conn.as_ref(), &self.table, registry)
            .await
        {
            Ok(fields) => StatementBuilder::build(conn.dialect(), fields, &self.table),
            Err(e) => Err(e),
        };

        match prepared {
            Ok(statement) => Ok(Session { conn, statement }),
            Err(e) => {
                if let Err(close_err) = conn.close().await {
                    warn!(error = %close_err, "failed to close connection after setup error");
                }
                Err(e)
            }
        }
    }

    fn apply_policy(&mut self) {
        match self.policy {
            ReconnectPolicy::Every(interval) => {
                warn!(
                    seconds = interval.as_secs(),
                    "no connection to database, attempting to reconnect later"
                );
                self.link = Link::Waiting {
                    retry_at: Instant::now() + interval,
                };
            }
            ReconnectPolicy::Disabled => {
                error!("no reconnect interval configured, disabling database output");
                self.link = Link::Down { disabled: true };
            }
        }
    }

    /// Close the open handle, if any, and return to `Disconnected`.
    ///
    /// A disabled or waiting manager keeps its state.
    pub async fn drop_connection(&mut self) {
        if !matches!(self.link, Link::Up(_)) {
            return;
        }
        let link = std::mem::replace(&mut self.link, Link::Down { disabled: false });
        if let Link::Up(session) = link {
            if let Err(e) = session.conn.close().await {
                warn!(error = %e, "failed to close database connection");
            }
        }
    }

    /// Release the handle on host shutdown. Later records are dropped.
    pub async fn shutdown(&mut self) {
        if self.is_closed() {
            return;
        }
        self.drop_connection().await;
        self.link = Link::Closed;
        info!(table = %self.table, "database output shut down");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("options", &self.options)
            .field("table", &self.table)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

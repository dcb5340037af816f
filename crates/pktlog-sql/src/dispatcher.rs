//! Per-record output entry point
//!
//! [`OutputDispatcher::output`] is called once per logged record. What it does
//! depends on the manager's [`DispatchMode`]:
//!
//! - `Insert`: render and execute; on an execution error reconnect inline
//!   and send the record once more
//! - `Reconnect`: connect, then send the record once
//! - `Idle`: waiting for the retry deadline, the record is skipped
//! - `Disabled`: the record is skipped, forever (also after shutdown)

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::config::SinkConfig;
use crate::connection::ConnectionFactory;
use crate::encoder::ValueEncoder;
use crate::error::{Error, Result};
use crate::manager::{ConnectionManager, ConnectionState, DispatchMode};
use crate::registry::KeyRegistry;
use crate::stats::{AtomicSinkStats, SinkStats};

/// Outcome of one output call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Record inserted
    Inserted,
    /// Record skipped, waiting for the reconnect deadline
    Deferred,
    /// Record skipped, sink disabled
    Disabled,
    /// Record refused because of an unsupported value
    Rejected,
}

enum InsertFailure {
    Render(Error),
    Execution(Error),
}

/// Single entry point of the host pipeline into the sink
#[derive(Debug)]
pub struct OutputDispatcher {
    manager: ConnectionManager,
    encoder: ValueEncoder,
    stats: Arc<AtomicSinkStats>,
}

impl OutputDispatcher {
    /// Create a dispatcher for `config`, opening connections via `factory`
    pub fn new(config: &SinkConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        config.check()?;

        let stats = Arc::new(AtomicSinkStats::default());
        let manager = ConnectionManager::new(
            factory,
            config.connect_options(),
            config.table.clone(),
            config.reconnect_policy(),
            stats.clone(),
        );
        let encoder = ValueEncoder::new(
            config.ip_encoding,
            config.unsupported_values,
            stats.clone(),
        );

        Ok(Self {
            manager,
            encoder,
            stats,
        })
    }

    /// Create a dispatcher writing to MySQL
    #[cfg(feature = "mysql")]
    pub fn mysql(config: &SinkConfig) -> Result<Self> {
        Self::new(config, Arc::new(crate::mysql::MySqlConnectionFactory::new()))
    }

    /// Initial connect.
    ///
    /// A failure leaves the sink waiting for its retry deadline, or disabled
    /// when no reconnect interval is configured; later output calls behave
    /// accordingly.
    pub async fn start(&mut self, registry: &dyn KeyRegistry) -> Result<()> {
        self.manager.connect(registry).await
    }

    /// Output the registry's current record
    pub async fn output(&mut self, registry: &dyn KeyRegistry) -> Result<Delivery> {
        match self.manager.mode() {
            DispatchMode::Disabled => {
                self.stats.record_disabled();
                Ok(Delivery::Disabled)
            }
            DispatchMode::Idle => {
                self.stats.record_deferred();
                Ok(Delivery::Deferred)
            }
            DispatchMode::Reconnect => {
                if let Err(e) = self.manager.connect(registry).await {
                    self.stats.record_failed();
                    return Err(e);
                }
                self.deliver_once(registry).await
            }
            DispatchMode::Insert => match self.insert(registry).await {
                Ok(delivery) => Ok(delivery),
                Err(InsertFailure::Render(e)) => {
                    self.stats.record_failed();
                    Err(e)
                }
                Err(InsertFailure::Execution(e)) => {
                    warn!(error = %e, "insert failed, reconnecting");
                    if let Err(connect_err) = self.manager.connect(registry).await {
                        self.stats.record_failed();
                        return Err(connect_err);
                    }
                    self.deliver_once(registry).await
                }
            },
        }
    }

    /// Send the record on a fresh session without another reconnect
    async fn deliver_once(&mut self, registry: &dyn KeyRegistry) -> Result<Delivery> {
        match self.insert(registry).await {
            Ok(delivery) => Ok(delivery),
            Err(InsertFailure::Render(e)) => {
                self.stats.record_failed();
                Err(e)
            }
            Err(InsertFailure::Execution(e)) => {
                self.stats.record_failed();
                error!(error = %e, "insert failed on fresh connection, dropping record");
                self.manager.drop_connection().await;
                Err(e)
            }
        }
    }

    async fn insert(
        &mut self,
        registry: &dyn KeyRegistry,
    ) -> std::result::Result<Delivery, InsertFailure> {
        let session = self
            .manager
            .session_mut()
            .ok_or_else(|| InsertFailure::Render(Error::internal("no open session")))?;

        let sql = match session
            .statement
            .render(registry, &self.encoder, session.conn.as_ref())
        {
            Ok(sql) => sql,
            Err(Error::UnsupportedValue { .. }) => {
                self.stats.record_rejected();
                return Ok(Delivery::Rejected);
            }
            Err(e) => {
                error!(error = %e, "failed to render insert statement");
                return Err(InsertFailure::Render(e));
            }
        };

        debug!(statement = %sql, "executing insert");
        let started = Instant::now();
        match session.conn.execute(sql).await {
            Ok(_) => {
                self.stats.record_written(started.elapsed());
                Ok(Delivery::Inserted)
            }
            Err(e) => {
                self.stats.record_execution_failure();
                error!(error = %e, "sql error during insert");
                Err(InsertFailure::Execution(e))
            }
        }
    }

    /// Release the connection on host shutdown; later records are dropped
    pub async fn shutdown(&mut self) {
        self.manager.shutdown().await;
    }

    /// Connection state
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Behaviour of the next output call
    pub fn mode(&self) -> DispatchMode {
        self.manager.mode()
    }

    /// Connection manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Statistics snapshot
    pub fn stats(&self) -> SinkStats {
        self.stats.snapshot()
    }
}

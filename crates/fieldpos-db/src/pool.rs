//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     Database Connection Pools                        │
//! │                                                                      │
//! │  DbConfig::new(path) ── Database::new(config).await                  │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  ┌───────────────────────────┐   ┌───────────────────────────────┐   │
//! │  │    reader pool (N)        │   │     writer pool (1)           │   │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐  │   │  ┌─────┐                      │   │
//! │  │  │Conn1│ │Conn2│ │Conn3│  │   │  │Conn │ one connection        │   │
//! │  │  └─────┘ └─────┘ └─────┘  │   │  └─────┘                      │   │
//! │  │  snapshots, listings      │   │  every atomic unit            │   │
//! │  └───────────────────────────┘   └───────────────────────────────┘   │
//! │                                                                      │
//! │  WAL mode: readers never block the writer, and the single writer     │
//! │  connection serializes atomic units by pool acquisition - a          │
//! │  concurrent unit simply waits its turn, then sees committed state.   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why a single writer connection?
//! Every multi-entry operation is check-then-act on balances. SQLite only
//! has database-level write locking anyway, so one writer connection gives
//! pessimistic serialization of atomic units with no busy-retry loops: the
//! losing unit of a race observes the winner's committed balances and
//! fails cleanly (e.g. with `InsufficientStock`) instead of a lock error.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::cart::CartRepository;
use crate::repository::ledger::StockLedger;
use crate::repository::material::MaterialRepository;
use crate::repository::pickup::PickupRepository;
use crate::repository::product::ProductRepository;
use crate::service::cart::SalesCartStore;
use crate::service::catalog::CatalogService;
use crate::service::finalize::FinalizationEngine;
use crate::service::production::ProductionProcessor;
use crate::service::reservation::ReservationManager;
use crate::service::returns::ReturnProcessor;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/fieldpos.db").max_read_connections(4);
/// let db = Database::new(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the read pool.
    /// Default: 4
    pub max_read_connections: u32,

    /// How long an atomic unit may wait for the writer connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a read connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    /// The file will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_read_connections: 4,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of read connections.
    pub fn max_read_connections(mut self, max: u32) -> Self {
        self.max_read_connections = max;
        self
    }

    /// Sets the acquire/connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disables automatic migrations (for tests that manage schema).
    pub fn skip_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the FieldPOS database: a reader pool, the single-connection
/// writer pool, and accessors for repositories and services.
///
/// Cheap to clone; pools are reference counted.
#[derive(Debug, Clone)]
pub struct Database {
    reader: SqlitePool,
    writer: SqlitePool,
}

impl Database {
    /// Opens the database, configures both pools, and runs migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let options = config.connect_options();

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options.clone())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let reader = SqlitePoolOptions::new()
            .max_connections(config.max_read_connections)
            .min_connections(1)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_with(options.read_only(false))
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { reader, writer };

        if config.run_migrations {
            migrations::run_migrations(&db.writer).await?;
        }

        Ok(db)
    }

    /// The read pool, for snapshots and listings outside any atomic unit.
    pub fn reader(&self) -> &SqlitePool {
        &self.reader
    }

    /// Begins one atomic unit on the writer connection.
    ///
    /// The transaction handle is threaded explicitly through every ledger
    /// call of the unit; dropping it without commit rolls back every write
    /// performed so far.
    pub(crate) async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        debug!("Beginning atomic unit");
        let tx = self.writer.begin().await?;
        Ok(tx)
    }

    /// Closes both pools.
    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }

    // -------------------------------------------------------------------------
    // Repository accessors
    // -------------------------------------------------------------------------

    pub fn materials(&self) -> MaterialRepository {
        MaterialRepository::new(self.reader.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.reader.clone())
    }

    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.reader.clone())
    }

    pub fn pickups(&self) -> PickupRepository {
        PickupRepository::new(self.reader.clone())
    }

    pub fn carts(&self) -> CartRepository {
        CartRepository::new(self.reader.clone())
    }

    // -------------------------------------------------------------------------
    // Service accessors
    // -------------------------------------------------------------------------

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.clone())
    }

    pub fn production(&self) -> ProductionProcessor {
        ProductionProcessor::new(self.clone())
    }

    pub fn reservations(&self) -> ReservationManager {
        ReservationManager::new(self.clone())
    }

    pub fn sales_carts(&self) -> SalesCartStore {
        SalesCartStore::new(self.clone())
    }

    pub fn finalization(&self) -> FinalizationEngine {
        FinalizationEngine::new(self.clone())
    }

    pub fn returns(&self) -> ReturnProcessor {
        ReturnProcessor::new(self.clone())
    }
}

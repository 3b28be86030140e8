//! Database connection management.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

/// Tunables for the connection pool and per-operation deadlines.
#[derive(Debug, Clone)]
pub struct DbOptions {
    /// Maximum pooled connections. SQLite is single-writer, readers parallelize.
    pub max_connections: u32,
    /// How long to wait for a free pooled connection.
    pub acquire_timeout: Duration,
    /// How long SQLite itself waits on a locked database before reporting BUSY.
    pub busy_timeout: Duration,
    /// Upper bound on a whole store operation, see [`WardenDb::bounded`].
    pub operation_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(3),
            busy_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

/// Connection to the Warden database.
///
/// Holds escalation rules, infraction counters and verification tokens.
/// All mutation goes through the query functions in [`crate::queries`].
#[derive(Debug, Clone)]
pub struct WardenDb {
    pool: SqlitePool,
    operation_timeout: Duration,
}

impl WardenDb {
    /// Open or create a database at the given path with default options.
    pub async fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_with(path, DbOptions::default()).await
    }

    /// Open or create a database at the given path.
    ///
    /// This will:
    /// 1. Create the database file (and parent directory) if it doesn't exist
    /// 2. Configure SQLite for concurrent access (WAL mode, busy timeout)
    /// 3. Run any pending migrations
    pub async fn open_with(path: impl AsRef<Path>, options: DbOptions) -> DbResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists())
        {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening warden database: {}", path.display());

        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.busy_timeout)
            .pragma("synchronous", "NORMAL") // Safe with WAL
            .pragma("temp_store", "MEMORY")
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect)
            .await?;

        debug!("Database connection established");

        Self::run_migrations(&pool).await?;

        Ok(Self {
            pool,
            operation_timeout: options.operation_timeout,
        })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> DbResult<Self> {
        let options = DbOptions::default();
        let connect = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1) // In-memory must be single connection to share state
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            pool,
            operation_timeout: options.operation_timeout,
        })
    }

    /// Run database migrations.
    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        debug!("Running database migrations");
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Per-operation deadline applied by [`WardenDb::bounded`].
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Run a store operation under the operation deadline.
    ///
    /// A deadline hit surfaces as [`DbError::Unavailable`] with
    /// `maybe_applied = true`, since the statement may already have committed.
    pub async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "Store operation timed out"
                );
                Err(DbError::unavailable(
                    format!("{operation} timed out"),
                    true,
                ))
            }
        }
    }

    /// Close the database connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database is healthy.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

//! Error types for the database layer.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// SQLite primary result codes that mean "try again later".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Database error types.
#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    /// SQLite/sqlx error that is not worth retrying
    #[error("Database error: {0}")]
    #[diagnostic(code(warden_db::sqlx))]
    Sqlx(#[source] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(warden_db::migration))]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error (creating the database directory)
    #[error("IO error: {0}")]
    #[diagnostic(code(warden_db::io))]
    Io(#[from] std::io::Error),

    /// The store could not serve the request in time.
    ///
    /// `maybe_applied` is false only when the failure is known to have
    /// happened before the statement reached SQLite (or SQLite rejected it
    /// without applying it), so the caller may retry even non-idempotent
    /// operations.
    #[error("Store unavailable: {reason}")]
    #[diagnostic(
        code(warden_db::unavailable),
        help("The database is busy or unreachable; the operation may be retried")
    )]
    Unavailable { reason: String, maybe_applied: bool },

    /// Verification token collided with an existing one
    #[error("Verification token already exists")]
    #[diagnostic(code(warden_db::duplicate_token))]
    DuplicateToken,

    /// Invalid data read from or written to the store
    #[error("Invalid data: {message}")]
    #[diagnostic(code(warden_db::invalid_data))]
    InvalidData { message: String },
}

impl DbError {
    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(reason: impl Into<String>, maybe_applied: bool) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            maybe_applied,
        }
    }

    /// Whether this is a transient failure worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Whether a retry is safe even for an operation that must not run twice.
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            Self::Unavailable {
                maybe_applied: false,
                ..
            }
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                Self::unavailable("timed out waiting for a database connection", false)
            }
            sqlx::Error::PoolClosed => Self::unavailable("connection pool is closed", false),
            sqlx::Error::Io(e) => Self::unavailable(format!("I/O failure: {e}"), true),
            sqlx::Error::Database(ref db_err) if is_busy_code(db_err.code().as_deref()) => {
                // SQLite applies nothing when it reports BUSY/LOCKED.
                Self::unavailable(db_err.message().to_string(), false)
            }
            other => Self::Sqlx(other),
        }
    }
}

/// Check an (extended) SQLite result code for BUSY or LOCKED.
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

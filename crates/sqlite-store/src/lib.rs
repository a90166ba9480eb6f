//! A store backed by an existing SQLite database.
//!
//! The graph is expected to be laid out as node and relationship tables,
//! described to the planner by the schema resource. This crate never creates
//! or migrates the database, it only runs the planner's queries.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod row;

use std::error::Error as StdError;
use std::fmt::{self, Display};

use grounded_agent_store::{
    ErrorKind, Record, Store, StoreError, StoreSession,
};
use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use config::{SqliteStoreConfig, SqliteStoreConfigBuilder};

/// Error type for [`SqliteStore`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl StoreError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Errors reported by SQLite itself are about the statement:
            // syntax errors, unknown tables or columns, writes to a
            // read-only database, etc.
            sqlx::Error::Database(db_err) => {
                Error::new(db_err.message(), ErrorKind::InvalidQuery)
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                Error::new(err.to_string(), ErrorKind::Unavailable)
            }
            _ => Error::new(err.to_string(), ErrorKind::Other),
        }
    }
}

/// A [`Store`] over a pool of SQLite connections.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to the database described by `config`.
    ///
    /// Fails with [`ErrorKind::Unavailable`] if the database file doesn't
    /// exist, it's never created here.
    pub async fn connect(config: &SqliteStoreConfig) -> Result<Self, Error> {
        if !config.path.is_file() {
            return Err(Error::new(
                format!("database not found: {}", config.path.display()),
                ErrorKind::Unavailable,
            ));
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(config.read_only)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|err| {
                error!("failed to open {}: {err}", config.path.display());
                Error::from(err)
            })?;
        debug!(
            "connected to {} (read only: {})",
            config.path.display(),
            config.read_only
        );
        Ok(Self { pool })
    }

    /// Creates a store from an existing pool.
    #[inline]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl Store for SqliteStore {
    type Error = Error;
    type Session = SqliteSession;

    fn open_session(
        &self,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send {
        let pool = self.pool.clone();
        async move {
            let conn = pool.acquire().await?;
            trace!("acquired a connection");
            Ok(SqliteSession { conn })
        }
    }
}

/// A session holding one pooled connection.
///
/// The connection goes back to the pool when the session is dropped.
#[derive(Debug)]
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
}

impl StoreSession for SqliteSession {
    type Error = Error;

    fn execute(
        &mut self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send {
        async move {
            // Planner queries are rarely repeated verbatim, don't fill the
            // statement cache with them.
            let rows = sqlx::query(query)
                .persistent(false)
                .fetch_all(&mut *self.conn)
                .await?;
            let records = rows
                .iter()
                .map(row::to_record)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        }
    }
}

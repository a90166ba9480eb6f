use std::path::{Path, PathBuf};

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Builder for [`SqliteStoreConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SqliteStoreConfigBuilder {
    path: PathBuf,
    read_only: bool,
    max_connections: Option<u32>,
}

impl SqliteStoreConfigBuilder {
    /// Creates a builder for the database file at `path`.
    ///
    /// The database is opened read-only unless [`Self::read_write`] is
    /// called.
    #[inline]
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            read_only: true,
            max_connections: None,
        }
    }

    /// Allows queries to modify the database.
    #[inline]
    pub fn read_write(mut self) -> Self {
        self.read_only = false;
        self
    }

    /// Sets the size of the connection pool, which bounds the number of
    /// agent runs querying at the same time.
    #[inline]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = Some(max_connections.max(1));
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path,
            read_only: self.read_only,
            max_connections: self
                .max_connections
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

/// Configuration for [`crate::SqliteStore`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SqliteStoreConfig {
    pub(crate) path: PathBuf,
    pub(crate) read_only: bool,
    pub(crate) max_connections: u32,
}

impl SqliteStoreConfig {
    /// Returns the database file path.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

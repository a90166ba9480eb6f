//! A scripted in-memory store for tests.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::ready;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use grounded_agent_store::{
    ErrorKind, Record, Store, StoreError, StoreSession,
};

#[derive(Debug)]
pub struct ScriptedError {
    kind: ErrorKind,
    message: String,
}

impl Display for ScriptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ScriptedError {}

impl StoreError for ScriptedError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Answers known queries with preset rows and rejects everything else.
#[derive(Clone, Default)]
pub struct ScriptedStore {
    rows: Arc<HashMap<String, Vec<Record>>>,
    unavailable: bool,
    disconnected: bool,
    live_sessions: Arc<AtomicUsize>,
    executed: Arc<AtomicUsize>,
}

impl ScriptedStore {
    pub fn with_rows(mut self, query: &str, rows: Vec<Record>) -> Self {
        Arc::make_mut(&mut self.rows).insert(query.to_owned(), rows);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Opens sessions normally, but every query fails as if the connection
    /// had been lost.
    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl Store for ScriptedStore {
    type Error = ScriptedError;
    type Session = ScriptedSession;

    fn open_session(
        &self,
    ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send {
        let result = if self.unavailable {
            Err(ScriptedError {
                kind: ErrorKind::Unavailable,
                message: "connection refused".to_owned(),
            })
        } else {
            self.live_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedSession {
                store: self.clone(),
            })
        };
        ready(result)
    }
}

pub struct ScriptedSession {
    store: ScriptedStore,
}

impl StoreSession for ScriptedSession {
    type Error = ScriptedError;

    fn execute(
        &mut self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send {
        self.store.executed.fetch_add(1, Ordering::SeqCst);
        let result = match self.store.rows.get(query) {
            _ if self.store.disconnected => Err(ScriptedError {
                kind: ErrorKind::Unavailable,
                message: "connection reset by peer".to_owned(),
            }),
            Some(rows) => Ok(rows.clone()),
            None => Err(ScriptedError {
                kind: ErrorKind::InvalidQuery,
                message: format!("cannot parse `{query}`"),
            }),
        };
        ready(result)
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.store.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use grounded_agent_store::{
    ErrorKind as StoreErrorKind, Record, Store, StoreError, StoreSession,
};
use tokio::sync::Mutex;

use crate::tool::Error;

#[async_trait]
trait SessionObject: Send {
    async fn run_query(
        &mut self,
        query: &str,
    ) -> Result<Vec<Record>, Box<dyn StoreError>>;
}

#[async_trait]
impl<S: StoreSession> SessionObject for S {
    async fn run_query(
        &mut self,
        query: &str,
    ) -> Result<Vec<Record>, Box<dyn StoreError>> {
        self.execute(query)
            .await
            .map_err(|err| Box::new(err) as Box<dyn StoreError>)
    }
}

/// Runs queries against the store session of the current run.
///
/// Clones share the same session, queries from concurrent tool calls are
/// executed one at a time.
#[derive(Clone)]
pub struct QueryExecutor {
    session: Arc<Mutex<Box<dyn SessionObject>>>,
}

impl QueryExecutor {
    #[inline]
    pub(crate) fn new<S: StoreSession>(session: S) -> Self {
        Self {
            session: Arc::new(Mutex::new(Box::new(session))),
        }
    }

    /// Executes the query text and returns the records in store order.
    ///
    /// Any failure is reported as a query execution error whose reason is
    /// the store's own message, so the planner can correct the query.
    pub async fn execute(&self, query: &str) -> Result<Vec<Record>, Error> {
        let mut session = self.session.lock().await;
        match session.run_query(query).await {
            Ok(records) => {
                debug!("query returned {} records", records.len());
                Ok(records)
            }
            Err(err) => {
                if err.kind() == StoreErrorKind::InvalidQuery {
                    warn!("query rejected: {err}");
                } else {
                    error!("query failed: {err}");
                }
                Err(Error::query_execution().with_reason(err.to_string()))
            }
        }
    }
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor").finish_non_exhaustive()
    }
}

type OpenSessionResult = Result<QueryExecutor, Box<dyn StoreError>>;
type BoxedOpenSessionFuture =
    Pin<Box<dyn Future<Output = OpenSessionResult> + Send>>;
type OpenFn = Arc<dyn Fn() -> BoxedOpenSessionFuture + Send + Sync>;

/// A type-erased handle to the store, shared by every run.
#[derive(Clone)]
pub(crate) struct StoreClient {
    open_fn: OpenFn,
}

impl StoreClient {
    pub fn new<S: Store>(store: S) -> Self {
        let store = Arc::new(store);
        let open_fn: OpenFn = Arc::new(move || {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let session = store
                    .open_session()
                    .await
                    .map_err(|err| Box::new(err) as Box<dyn StoreError>)?;
                Ok::<_, Box<dyn StoreError>>(QueryExecutor::new(session))
            })
        });
        Self { open_fn }
    }

    /// Opens a session that lives as long as the returned executor and
    /// its clones.
    #[inline]
    pub async fn open_session(&self) -> OpenSessionResult {
        (self.open_fn)().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedStore;
    use crate::tool::ErrorKind;

    #[tokio::test]
    async fn test_execute() {
        let store = ScriptedStore::default().with_rows(
            "MATCH (p:person) RETURN p.name",
            vec![
                [("p.name", json!("Alice"))].into_iter().collect(),
                [("p.name", json!("Bob"))].into_iter().collect(),
            ],
        );
        let client = StoreClient::new(store.clone());
        let executor = client.open_session().await.unwrap();
        assert_eq!(store.live_sessions(), 1);

        let records = executor
            .execute("MATCH (p:person) RETURN p.name")
            .await
            .unwrap();
        let names: Vec<_> =
            records.iter().map(|r| r.get("p.name").unwrap()).collect();
        assert_eq!(names, [&json!("Alice"), &json!("Bob")]);

        drop(executor);
        assert_eq!(store.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_execute_invalid() {
        let store = ScriptedStore::default();
        let executor =
            StoreClient::new(store).open_session().await.unwrap();
        let err = executor.execute("MATCH (x:nothing)").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);
        assert!(err.reason().contains("MATCH (x:nothing)"));
    }

    #[tokio::test]
    async fn test_execute_disconnected() {
        let store = ScriptedStore::default()
            .with_rows("MATCH (p:person) RETURN p", vec![])
            .disconnected();
        let executor =
            StoreClient::new(store).open_session().await.unwrap();
        let err = executor
            .execute("MATCH (p:person) RETURN p")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);
        assert_eq!(err.reason(), "connection reset by peer");
    }

    #[tokio::test]
    async fn test_open_unavailable() {
        let store = ScriptedStore::default().unavailable();
        let err = StoreClient::new(store).open_session().await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Unavailable);
    }
}

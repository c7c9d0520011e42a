//! In-memory relational store.
//!
//! Serves canned result sets keyed by query text. It is meant for tests,
//! demos and embedding where the rows come from somewhere other than SQL.
//! Failures can be scripted to exercise the synchronization engine's
//! recovery paths:
//!
//! * refuse the next `n` connection attempts
//! * fail upcoming queries with a given error
//! * drop the connection, which fires [`connection_lost`] at once and makes
//!   the next query report it
//!
//! [`connection_lost`]: RelationalStore::connection_lost

use crate::store::{RelationalStore, Row, StoreError};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Thread-safe scriptable store.
///
/// Cloning yields a handle to the same state, so a test can keep one clone
/// while the engine owns another.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    // mirrors `StoreState::connected` for loss notification
    link: Arc<watch::Sender<bool>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            link: Arc::new(watch::channel(false).0),
        }
    }
}

#[derive(Default)]
struct StoreState {
    // query text (trimmed) -> result rows
    tables: HashMap<String, Vec<Row>>,
    connected: bool,
    refused_connects: usize,
    pending_errors: VecDeque<StoreError>,
    stats: InMemoryStoreStats,
}

/// Counters for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InMemoryStoreStats {
    pub connect_attempts: usize,
    pub successful_connects: usize,
    pub queries: usize,
}

impl InMemoryStore {
    /// Create an empty, disconnected store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the result set returned for `sql`.
    pub async fn set_rows(&self, sql: &str, rows: Vec<Row>) {
        let mut state = self.state.write().await;
        state.tables.insert(sql.trim().to_string(), rows);
    }

    /// Refuse the next `attempts` calls to `connect`.
    pub async fn refuse_connections(&self, attempts: usize) {
        self.state.write().await.refused_connects = attempts;
    }

    /// Fail the next query with `error`. Errors queue in call order.
    pub async fn fail_next_query(&self, error: StoreError) {
        self.state.write().await.pending_errors.push_back(error);
    }

    /// Forget the result set for `sql`, so querying it fails.
    pub async fn remove_rows(&self, sql: &str) {
        self.state.write().await.tables.remove(sql.trim());
    }

    /// Drop the current connection.
    pub async fn drop_connection(&self) {
        let mut state = self.state.write().await;
        self.set_connected(&mut state, false);
    }

    /// Whether a connection is currently open.
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    /// Usage counters.
    pub async fn stats(&self) -> InMemoryStoreStats {
        self.state.read().await.stats
    }

    fn set_connected(&self, state: &mut StoreState, connected: bool) {
        state.connected = connected;
        self.link.send_replace(connected);
    }
}

impl RelationalStore for InMemoryStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.stats.connect_attempts += 1;

        if state.refused_connects > 0 {
            state.refused_connects -= 1;
            self.set_connected(&mut state, false);
            return Err(StoreError::connection("connection refused"));
        }

        self.set_connected(&mut state, true);
        state.stats.successful_connects += 1;
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        let mut state = self.state.write().await;
        state.stats.queries += 1;

        if !state.connected {
            return Err(StoreError::NotConnected);
        }

        if let Some(error) = state.pending_errors.pop_front() {
            if error.is_connection_loss() {
                self.set_connected(&mut state, false);
            }
            return Err(error);
        }

        state
            .tables
            .get(sql.trim())
            .cloned()
            .ok_or_else(|| StoreError::query(format!("no result set registered for '{}'", sql.trim())))
    }

    async fn connection_lost(&self) {
        let mut link = self.link.subscribe();
        let lost = link.wait_for(|connected| !*connected).await.is_ok();
        if !lost {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok, assert_pending, assert_ready, task};

    fn user_row(name: &str) -> Row {
        Row::from_pairs([("username", Some(name))])
    }

    #[tokio::test]
    async fn test_query_requires_connection() {
        let store = InMemoryStore::new();
        store.set_rows("SELECT 1", vec![user_row("alice")]).await;

        let err = assert_err!(store.query("SELECT 1").await);
        assert_eq!(err, StoreError::NotConnected);

        assert_ok!(store.connect().await);
        let rows = assert_ok!(store.query("  SELECT 1 ").await);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_refused_connections_count_down() {
        let store = InMemoryStore::new();
        store.refuse_connections(2).await;

        assert_err!(store.connect().await);
        assert_err!(store.connect().await);
        assert_ok!(store.connect().await);

        let stats = store.stats().await;
        assert_eq!(stats.connect_attempts, 3);
        assert_eq!(stats.successful_connects, 1);
    }

    #[tokio::test]
    async fn test_injected_connection_loss_disconnects() {
        let store = InMemoryStore::new();
        store.set_rows("q", vec![]).await;
        store.connect().await.unwrap();
        store
            .fail_next_query(StoreError::connection_lost("gone away"))
            .await;

        assert!(store.query("q").await.unwrap_err().is_connection_loss());
        assert!(!store.is_connected().await);
        assert_eq!(store.query("q").await.unwrap_err(), StoreError::NotConnected);
    }

    #[tokio::test]
    async fn test_unknown_query_is_query_error() {
        let store = InMemoryStore::new();
        store.connect().await.unwrap();

        let err = store.query("SELECT * FROM nowhere").await.unwrap_err();
        assert!(!err.is_connection_loss());
    }

    #[tokio::test]
    async fn test_dropped_connection_fires_loss_signal() {
        let store = InMemoryStore::new();
        assert_ok!(store.connect().await);

        let mut lost = task::spawn(store.connection_lost());
        assert_pending!(lost.poll());

        store.drop_connection().await;
        assert!(lost.is_woken());
        assert_ready!(lost.poll());
    }

    #[tokio::test]
    async fn test_removed_rows_fail_the_query() {
        let store = InMemoryStore::new();
        store.set_rows("q", vec![user_row("alice")]).await;
        assert_ok!(store.connect().await);
        store.remove_rows("q").await;

        let err = assert_err!(store.query("q").await);
        assert!(matches!(err, StoreError::Query { .. }));
    }
}

//! Relational store abstraction.
//!
//! The directory never talks to a database driver directly. The
//! [`RelationalStore`] trait is the only surface the synchronization engine
//! needs: open a connection and run a query that returns plain rows. Drivers
//! live behind it, which keeps the refresh logic testable against
//! [`InMemoryStore`].
//!
//! # Example Usage
//!
//! ```rust
//! use ldap_sql_bridge::store::{InMemoryStore, RelationalStore, Row};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! store
//!     .set_rows(
//!         "SELECT * FROM users",
//!         vec![Row::from_pairs([("username", Some("alice"))])],
//!     )
//!     .await;
//!
//! store.connect().await?;
//! let rows = store.query("SELECT * FROM users").await?;
//! assert_eq!(rows[0].get("username"), Some("alice"));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;
#[cfg(feature = "mysql")]
pub mod mysql;

pub use errors::StoreError;
pub use in_memory::InMemoryStore;
#[cfg(feature = "mysql")]
pub use mysql::MySqlStore;

use std::collections::BTreeMap;
use std::future::Future;

/// One result row: column name to scalar value rendered as text.
///
/// `None` is SQL `NULL`. Absent columns and `NULL` columns are treated the
/// same by the attribute mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: BTreeMap<String, Option<String>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }

    /// Set a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.columns.insert(column.into(), value);
    }

    /// Non-null value of a column.
    ///
    /// Exact column names win; otherwise the first column whose name matches
    /// ignoring ASCII case is used, since drivers differ in how they report
    /// identifier case.
    pub fn get(&self, column: &str) -> Option<&str> {
        match self.columns.get(column) {
            Some(value) => value.as_deref(),
            None => self
                .columns
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .and_then(|(_, value)| value.as_deref()),
        }
    }

    /// Number of columns in the row, including `NULL` ones.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Client for the relational store holding users and groups.
///
/// Implementations are owned by the synchronization engine; request handlers
/// never reach the store. Losing the connection is announced two ways: the
/// future from [`connection_lost`](Self::connection_lost) completes, and
/// queries fail with an error for which [`StoreError::is_connection_loss`]
/// returns `true`. Either sends the engine back through reconnection.
pub trait RelationalStore: Send + Sync {
    /// Establish (or re-establish) the connection.
    fn connect(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Run a read query and return every row.
    fn query(&self, sql: &str) -> impl Future<Output = Result<Vec<Row>, StoreError>> + Send;

    /// Complete once the current connection is gone.
    ///
    /// Resolves immediately when not connected. Called after each successful
    /// connect and raced against the refresh timer.
    fn connection_lost(&self) -> impl Future<Output = ()> + Send;
}

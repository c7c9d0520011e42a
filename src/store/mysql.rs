//! MySQL/MariaDB client for the relational store.
//!
//! Enabled with the `mysql` feature. Rows come back through sqlx as typed
//! columns; every non-null scalar is rendered as text so the attribute mapper
//! sees the same [`Row`] shape as with any other store.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ldap_sql_bridge::config::SqlConfig;
//! use ldap_sql_bridge::store::{MySqlStore, RelationalStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MySqlStore::new(&SqlConfig {
//!     user: "ldap".to_string(),
//!     password: "secret".to_string(),
//!     database: "accounts".to_string(),
//!     ..SqlConfig::default()
//! });
//!
//! store.connect().await?;
//! let rows = store.query("SELECT username, password FROM users").await?;
//! println!("{} users", rows.len());
//! # Ok(())
//! # }
//! ```

use crate::config::{DirectorySettings, SqlConfig};
use crate::store::{RelationalStore, Row, StoreError};
use log::{debug, warn};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};
use std::time::Duration;
use tokio::sync::RwLock;

/// Relational store backed by a MySQL connection pool.
pub struct MySqlStore {
    options: MySqlConnectOptions,
    connect_timeout: Duration,
    query_timeout: Duration,
    health_check_interval: Duration,
    pool: RwLock<Option<MySqlPool>>,
}

impl MySqlStore {
    /// Create a store for `config`. No connection is made until
    /// [`connect`](RelationalStore::connect).
    pub fn new(config: &SqlConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        Self {
            options,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            health_check_interval: Duration::from_millis(config.health_check_interval_ms),
            pool: RwLock::new(None),
        }
    }

    /// Create a store from validated directory settings.
    pub fn from_settings(settings: &DirectorySettings) -> Self {
        Self::new(&settings.sql)
    }

    /// Close the pool, if open.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
    }
}

impl RelationalStore for MySqlStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(self.connect_timeout)
            .connect_with(self.options.clone())
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let previous = self.pool.write().await.replace(pool);
        if let Some(previous) = previous {
            previous.close().await;
        }
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        let pool = self
            .pool
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotConnected)?;

        let rows = tokio::time::timeout(self.query_timeout, sqlx::query(sql).fetch_all(&pool))
            .await
            .map_err(|_| {
                StoreError::query(format!(
                    "timed out after {} ms",
                    self.query_timeout.as_millis()
                ))
            })?
            .map_err(classify_error)?;

        debug!("Query returned {} rows", rows.len());
        rows.iter().map(convert_row).collect()
    }

    async fn connection_lost(&self) {
        loop {
            let Some(pool) = self.pool.read().await.clone() else {
                return;
            };
            if pool.is_closed() {
                return;
            }

            let alive = match pool.acquire().await {
                Ok(mut conn) => conn.ping().await.map_err(classify_error),
                Err(err) => Err(classify_error(err)),
            };
            if let Err(err) = alive {
                if err.is_connection_loss() {
                    warn!("MySQL health check failed: {}", err);
                    return;
                }
                debug!("MySQL health check error ignored: {}", err);
            }

            tokio::time::sleep(self.health_check_interval).await;
        }
    }
}

/// Pool and socket failures mean the connection is gone; everything else is
/// a problem with the query itself.
fn classify_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::connection_lost(err.to_string())
        }
        other => StoreError::query(other.to_string()),
    }
}

fn convert_row(row: &MySqlRow) -> Result<Row, StoreError> {
    let mut converted = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let is_null = row
            .try_get_raw(index)
            .map_err(|e| StoreError::query(e.to_string()))?
            .is_null();

        let value = if is_null {
            None
        } else {
            let text = column_text(row, index);
            if text.is_none() {
                warn!(
                    "Column '{}' has unsupported type {}; treating it as NULL",
                    column.name(),
                    column.type_info().name()
                );
            }
            text
        };
        converted.insert(column.name(), value);
    }
    Ok(converted)
}

fn column_text(row: &MySqlRow, index: usize) -> Option<String> {
    row.try_get::<String, _>(index)
        .ok()
        .or_else(|| row.try_get::<i64, _>(index).ok().map(|v| v.to_string()))
        .or_else(|| row.try_get::<u64, _>(index).ok().map(|v| v.to_string()))
        .or_else(|| row.try_get::<f64, _>(index).ok().map(|v| v.to_string()))
        .or_else(|| row.try_get::<bool, _>(index).ok().map(|v| v.to_string()))
        .or_else(|| {
            row.try_get::<Vec<u8>, _>(index)
                .ok()
                .map(|v| String::from_utf8_lossy(&v).into_owned())
        })
}

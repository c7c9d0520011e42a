//! Errors reported by relational store clients.

use thiserror::Error;

/// Errors that can occur while talking to the relational store.
///
/// The split matters to the synchronization engine: connection-level errors
/// send it back to reconnection, query-level errors only abort the current
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Connection failed: {message}")]
    Connection {
        /// Driver message for the refused connection
        message: String,
    },

    #[error("Connection lost: {message}")]
    ConnectionLost {
        /// Driver message for the dropped connection
        message: String,
    },

    #[error("Query failed: {message}")]
    Query {
        /// Driver message for the failed query
        message: String,
    },

    #[error("Not connected")]
    NotConnected,
}

impl StoreError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a connection-lost error.
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Whether the engine has to reconnect before the next refresh.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            StoreError::Connection { .. } | StoreError::ConnectionLost { .. } | StoreError::NotConnected
        )
    }
}

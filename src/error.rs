//! Error types for the directory bridge.
//!
//! Errors are split along the two paths the crate serves:
//!
//! - the refresh path (configuration, relational store, row mapping), whose
//!   failures are recovered locally so the last good snapshot keeps serving;
//! - the request path (bind and search), whose failures are surfaced to the
//!   protocol engine as LDAP result codes via [`ResultCode`].

use crate::store::StoreError;

/// Main error type for directory operations outside the request path.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The relational store refused or dropped the connection
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] StoreError),

    /// A users or groups query failed during a refresh
    #[error("Query failure while loading {entity}: {source}")]
    QueryFailure {
        entity: &'static str,
        #[source]
        source: StoreError,
    },

    /// The engine was shut down while an operation was pending
    #[error("Synchronization engine stopped")]
    Stopped,
}

impl DirectoryError {
    /// Whether this error means the backend connection has to be re-established.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            DirectoryError::BackendUnavailable(_) => true,
            DirectoryError::QueryFailure { source, .. } => source.is_connection_loss(),
            _ => false,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required value is missing or empty
    #[error("Missing required configuration value '{key}'")]
    Missing { key: String },

    /// Value is present but unusable
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    /// The naming attribute of an entity has no column mapping
    #[error("Naming attribute '{attribute}' of {entity} has no column mapping")]
    UnmappedNamingAttribute {
        entity: &'static str,
        attribute: String,
    },

    /// Reading the configuration or a query file failed
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for the expected shape
    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Row-level failure while building a snapshot.
///
/// These never abort a refresh; the offending row is skipped and logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Naming column absent, NULL or empty in a row
    #[error("Row has no value for naming column '{column}' ({entity})")]
    MissingNamingColumn {
        entity: &'static str,
        column: String,
    },
}

/// LDAP result codes surfaced to the protocol engine.
///
/// Only the codes this directory can produce are modeled. The discriminants
/// are the RFC 4511 numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ResultCode {
    #[error("operationsError")]
    OperationsError = 1,
    #[error("sizeLimitExceeded")]
    SizeLimitExceeded = 4,
    #[error("noSuchAttribute")]
    NoSuchAttribute = 16,
    #[error("noSuchObject")]
    NoSuchObject = 32,
    #[error("invalidCredentials")]
    InvalidCredentials = 49,
    #[error("insufficientAccessRights")]
    InsufficientAccess = 50,
}

impl ResultCode {
    /// Numeric LDAP result code.
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Result type alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

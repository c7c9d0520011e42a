//! Read-only LDAP directory view over SQL user and group tables.
//!
//! Rows are loaded periodically from a relational store, mapped onto
//! directory entries and published as an immutable snapshot. Bind and search
//! requests are answered from whichever snapshot is current when they arrive.
//!
//! # Core Components
//!
//! - [`Directory`] - Service facade embedding the handlers and the engine
//! - [`SyncEngine`] - Refresh loop with reconnection and atomic publication
//! - [`Snapshot`] - One consistent view of users, groups and OUs
//! - [`RelationalStore`] - Trait for relational store clients
//! - [`handlers`] - Bind and search decisions, plus the protocol-facing traits
//!
//! # Quick Start
//!
//! ```rust
//! use ldap_sql_bridge::config::DirectoryConfig;
//! use ldap_sql_bridge::store::{InMemoryStore, RelationalStore, Row};
//! use ldap_sql_bridge::{SyncEngine, BindHandler};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = DirectoryConfig::from_json_str(r#"{
//!     "base_dn": "dc=example,dc=com",
//!     "base_dc": "example",
//!     "users": {
//!         "ou": "users", "rdn": "uid",
//!         "sql_mapping": { "uid": "username", "userPassword": "password" },
//!         "query": "SELECT username, password FROM users"
//!     },
//!     "groups": {
//!         "ou": "groups", "rdn": "cn",
//!         "sql_mapping": { "cn": "name" },
//!         "member_mapping": { "member": "username" },
//!         "query": "SELECT name, username FROM memberships"
//!     }
//! }"#)?
//! .validate()?;
//!
//! let store = InMemoryStore::new();
//! store
//!     .set_rows(
//!         "SELECT username, password FROM users",
//!         vec![Row::from_pairs([("username", Some("alice")), ("password", Some("secret"))])],
//!     )
//!     .await;
//! store.set_rows("SELECT name, username FROM memberships", vec![]).await;
//! store.connect().await?;
//!
//! let engine = SyncEngine::new(Arc::new(settings.clone()), store);
//! engine.refresh().await?;
//!
//! let snapshot = engine.snapshots().load();
//! let bind = BindHandler::new(settings.access);
//! assert!(bind.bind(&snapshot, "uid=alice,ou=users,dc=example,dc=com", "secret").is_ok());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential;
pub mod directory;
pub mod dn;
pub mod entry;
pub mod error;
pub mod handlers;
pub mod mapping;
pub mod scope;
pub mod snapshot;
pub mod store;
pub mod sync;

// Re-export commonly used types for convenience
pub use config::{DirectoryConfig, DirectorySettings, MappingRule};
pub use directory::Directory;
pub use entry::{AttributeMap, AttributeValue, DirectoryEntry};
pub use error::{BuildError, ConfigError, DirectoryError, DirectoryResult, ResultCode};
pub use handlers::{BindHandler, EntryFilter, SearchHandler, SearchRequest, SearchResponder};
pub use scope::Scope;
pub use snapshot::Snapshot;
pub use store::{RelationalStore, Row, StoreError};
pub use sync::{SnapshotHandle, SyncEngine, SyncState};

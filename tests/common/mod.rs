//! Shared fixtures for the integration tests.
//!
//! The fixture directory has two users (alice and carol) and two groups:
//! `admins` lists alice and bob, where bob has no user row, and `staff` lists
//! alice and carol.

#![allow(dead_code)]

pub mod fixtures;

use ldap_sql_bridge::config::{DirectoryConfig, DirectorySettings};
use ldap_sql_bridge::store::InMemoryStore;
use serde_json::Value;

pub const BASE_DN: &str = "dc=example,dc=com";
pub const USERS_QUERY: &str = "SELECT username, full_name, email, password FROM users";
pub const GROUPS_QUERY: &str = "SELECT g.name, m.username FROM groups g JOIN members m ON m.group_id = g.id";

/// Route `log` output through the test harness; `RUST_LOG=debug` to see it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Validated settings for the fixture directory.
pub fn settings() -> DirectorySettings {
    settings_from(fixtures::config_json())
}

pub fn settings_from(config: Value) -> DirectorySettings {
    DirectoryConfig::from_json_str(&config.to_string())
        .expect("fixture config parses")
        .validate()
        .expect("fixture config validates")
}

/// Store seeded with the fixture rows, not yet connected.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.set_rows(USERS_QUERY, fixtures::user_rows()).await;
    store.set_rows(GROUPS_QUERY, fixtures::group_rows()).await;
    store
}

pub fn user_dn(uid: &str) -> String {
    format!("uid={},ou=users,{}", uid, BASE_DN)
}

pub fn group_dn(cn: &str) -> String {
    format!("cn={},ou=groups,{}", cn, BASE_DN)
}

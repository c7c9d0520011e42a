//! Configuration and rows for the fixture directory.

use super::{BASE_DN, GROUPS_QUERY, USERS_QUERY};
use ldap_sql_bridge::store::Row;
use serde_json::{Value, json};

/// `{SHA}` of "secret".
pub const ALICE_PASSWORD_HASH: &str = "{SHA}5en6G6MezRroT3XKqkdPOmY/BfQ=";

/// `{MD5}` of "password".
pub const CAROL_PASSWORD_HASH: &str = "{MD5}X03MO1qnZdYdgyfeuILPmQ==";

pub fn config_json() -> Value {
    json!({
        "base_dn": BASE_DN,
        "base_dc": "example",
        "users": {
            "ou": "users",
            "rdn": "uid",
            "sql_mapping": {
                "uid": "username",
                "cn": "full_name",
                "mail": "email",
                "userPassword": "password"
            },
            "static_mapping": { "objectClass": ["top", "person", "inetOrgPerson"] },
            "query": USERS_QUERY
        },
        "groups": {
            "ou": "ou=groups",
            "rdn": "cn",
            "sql_mapping": { "cn": "name" },
            "static_mapping": { "objectClass": "groupOfNames" },
            "member_mapping": { "member": "username" },
            "query": GROUPS_QUERY
        },
        "sync": { "refresh_interval_ms": 1000, "reconnect_delay_ms": 200 }
    })
}

pub fn user(username: &str, full_name: &str, password: Option<&str>) -> Row {
    Row::from_pairs([
        ("username", Some(username.to_string())),
        ("full_name", Some(full_name.to_string())),
        ("email", Some(format!("{}@example.com", username))),
        ("password", password.map(str::to_string)),
    ])
}

pub fn membership(group: &str, username: &str) -> Row {
    Row::from_pairs([("name", Some(group)), ("username", Some(username))])
}

pub fn user_rows() -> Vec<Row> {
    vec![
        user("alice", "Alice Liddell", Some(ALICE_PASSWORD_HASH)),
        user("carol", "Carol Danvers", Some(CAROL_PASSWORD_HASH)),
    ]
}

pub fn group_rows() -> Vec<Row> {
    vec![
        membership("admins", "alice"),
        membership("admins", "bob"),
        membership("staff", "alice"),
        membership("staff", "carol"),
    ]
}

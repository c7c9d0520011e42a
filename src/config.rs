//! Directory configuration.
//!
//! Configuration is read from JSON into [`DirectoryConfig`], which mirrors the
//! file layout, and then validated into [`DirectorySettings`], the immutable
//! form every other module consumes. Validation normalizes attribute names to
//! lowercase, strips an optional `ou=` prefix from OU names, loads queries
//! from `query_file` where given, and rejects mapping rules whose naming
//! attribute has no column mapping.
//!
//! # Example
//!
//! ```rust
//! use ldap_sql_bridge::config::DirectoryConfig;
//!
//! let settings = DirectoryConfig::from_json_str(r#"{
//!     "base_dn": "dc=example,dc=com",
//!     "base_dc": "example",
//!     "users": {
//!         "ou": "users",
//!         "rdn": "cn",
//!         "sql_mapping": { "cn": "full_name", "userPassword": "password" },
//!         "static_mapping": { "objectClass": "inetOrgPerson" },
//!         "query": "SELECT * FROM users"
//!     },
//!     "groups": {
//!         "ou": "groups",
//!         "rdn": "cn",
//!         "sql_mapping": { "cn": "name" },
//!         "member_mapping": { "member": "full_name" },
//!         "query": "SELECT * FROM group_members"
//!     }
//! }"#)
//! .unwrap()
//! .validate()
//! .unwrap();
//!
//! assert_eq!(settings.users.naming_attribute, "cn");
//! assert_eq!(settings.refresh_interval().as_secs(), 300);
//! ```

use crate::dn;
use crate::entry::{AttributeMap, AttributeValue};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw directory configuration as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// DN appended to every entry, e.g. `dc=example,dc=com`
    pub base_dn: String,
    /// `dc` value of the root entry
    pub base_dc: String,
    pub users: EntityConfig,
    pub groups: EntityConfig,
    /// Reverse membership attribute placed on users
    #[serde(default = "default_member_of_attribute")]
    pub member_of_attribute: String,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sql: SqlConfig,
}

/// Mapping of one table (users or groups) onto directory entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Organizational unit holding the entries, with or without `ou=`
    pub ou: String,
    /// Naming attribute; must also appear in `sql_mapping`
    #[serde(alias = "naming_attribute")]
    pub rdn: String,
    /// Attributes set on every entry regardless of the row
    #[serde(default)]
    pub static_mapping: BTreeMap<String, AttributeValue>,
    /// Attribute name to source column
    #[serde(default)]
    pub sql_mapping: BTreeMap<String, String>,
    /// Groups only: member attribute to the column holding the member's
    /// naming value
    #[serde(default)]
    pub member_mapping: BTreeMap<String, String>,
    /// Query text
    #[serde(default)]
    pub query: Option<String>,
    /// File holding the query text, relative to the configuration file
    #[serde(default)]
    pub query_file: Option<PathBuf>,
}

/// Refresh and reconnect timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_refresh_interval_ms", alias = "timeout")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Access-control toggles for bind and search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Searches must come from a connection bound as a known user
    #[serde(default)]
    pub require_bind_for_search: bool,
    /// Report unknown bind DNs as insufficient access instead of no such object
    #[serde(default)]
    pub hide_unknown_bind_dn: bool,
}

/// Listener settings handed to the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            tls: None,
        }
    }
}

/// Certificate and key paths for TLS termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub certificate: PathBuf,
    pub key: PathBuf,
}

/// Relational store connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlConfig {
    #[serde(default = "default_sql_host")]
    pub host: String,
    #[serde(default = "default_sql_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// How often an idle connection is pinged to notice it dropping
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            host: default_sql_host(),
            port: default_sql_port(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

impl fmt::Debug for SqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .field("health_check_interval_ms", &self.health_check_interval_ms)
            .finish()
    }
}

fn default_member_of_attribute() -> String {
    "memberOf".to_string()
}

fn default_refresh_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    1389
}

fn default_sql_host() -> String {
    "localhost".to_string()
}

fn default_sql_port() -> u16 {
    3306
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

fn default_health_check_interval_ms() -> u64 {
    5_000
}

/// Validated mapping of one entity type onto the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Lowercase naming attribute
    pub naming_attribute: String,
    /// Column holding the naming value
    pub naming_column: String,
    /// OU name without the `ou=` prefix
    pub ou: String,
    /// Static attributes, applied after the dynamic ones
    pub static_attributes: AttributeMap,
    /// `(lowercase attribute, column)` pairs
    pub dynamic_attributes: Vec<(String, String)>,
    /// `(lowercase member attribute, column)` pairs, empty for users
    pub member_attributes: Vec<(String, String)>,
    /// Query returning the rows for this entity
    pub query: String,
}

/// Validated, immutable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySettings {
    pub base_dn: String,
    pub base_dc: String,
    pub users: MappingRule,
    pub groups: MappingRule,
    pub member_of_attribute: String,
    pub sync: SyncConfig,
    pub access: AccessConfig,
    pub server: ServerConfig,
    pub sql: SqlConfig,
}

impl DirectorySettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.sync.refresh_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.sync.reconnect_delay_ms)
    }

    /// DN of the users OU.
    pub fn users_ou_dn(&self) -> String {
        dn::ou_dn(&self.users.ou, &self.base_dn)
    }

    /// DN of the groups OU.
    pub fn groups_ou_dn(&self) -> String {
        dn::ou_dn(&self.groups.ou, &self.base_dn)
    }
}

impl DirectoryConfig {
    /// Parse configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read, resolve and validate a configuration file.
    ///
    /// `query_file` paths are resolved relative to the file's directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<DirectorySettings, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;

        let mut config = Self::from_json_str(&content)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_query_files(base_dir).await?;
        config.validate()
    }

    /// Replace every `query_file` with the file's contents.
    pub async fn resolve_query_files(&mut self, base_dir: &Path) -> Result<(), ConfigError> {
        for entity in [&mut self.users, &mut self.groups] {
            if let Some(file) = entity.query_file.take() {
                let full = base_dir.join(&file);
                let text = tokio::fs::read_to_string(&full)
                    .await
                    .map_err(|source| ConfigError::Io {
                        path: full.display().to_string(),
                        source,
                    })?;
                entity.query = Some(text);
            }
        }
        Ok(())
    }

    /// Validate and normalize into [`DirectorySettings`].
    pub fn validate(self) -> Result<DirectorySettings, ConfigError> {
        let base_dn = self.base_dn.trim();
        if base_dn.is_empty() {
            return Err(ConfigError::Missing {
                key: "base_dn".into(),
            });
        }
        if dn::split_rdns(base_dn)
            .iter()
            .any(|rdn| !rdn.contains('=') || rdn.trim().starts_with('='))
        {
            return Err(ConfigError::Invalid {
                key: "base_dn".into(),
                message: format!("'{}' is not an attr=value,... path", base_dn),
            });
        }
        // Keep the configured spelling but drop whitespace around separators.
        let base_dn = dn::split_rdns(base_dn)
            .iter()
            .map(|rdn| rdn.trim())
            .collect::<Vec<_>>()
            .join(",");

        if self.base_dc.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "base_dc".into(),
            });
        }

        if self.member_of_attribute.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "member_of_attribute".into(),
            });
        }

        if !self.users.member_mapping.is_empty() {
            return Err(ConfigError::Invalid {
                key: "users.member_mapping".into(),
                message: "member mappings only apply to groups".into(),
            });
        }

        if self.sync.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "sync.refresh_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        if let Some(tls) = &self.server.tls {
            if tls.certificate.as_os_str().is_empty() || tls.key.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "server.tls".into(),
                    message: "certificate and key are both required".into(),
                });
            }
        }

        let users = self.users.into_rule("users")?;
        let groups = self.groups.into_rule("groups")?;

        if dn::normalize(&dn::ou_dn(&users.ou, &base_dn))
            == dn::normalize(&dn::ou_dn(&groups.ou, &base_dn))
        {
            return Err(ConfigError::Invalid {
                key: "groups.ou".into(),
                message: format!("users and groups cannot share the OU '{}'", groups.ou),
            });
        }

        Ok(DirectorySettings {
            base_dn,
            base_dc: self.base_dc.trim().to_string(),
            users,
            groups,
            member_of_attribute: AttributeMap::normalize_name(&self.member_of_attribute),
            sync: self.sync,
            access: self.access,
            server: self.server,
            sql: self.sql,
        })
    }
}

impl EntityConfig {
    fn into_rule(self, entity: &'static str) -> Result<MappingRule, ConfigError> {
        let ou = dn::ou_name(&self.ou).to_string();
        if ou.is_empty() {
            return Err(ConfigError::Missing {
                key: format!("{entity}.ou"),
            });
        }

        let naming_attribute = AttributeMap::normalize_name(&self.rdn);
        if naming_attribute.is_empty() {
            return Err(ConfigError::Missing {
                key: format!("{entity}.rdn"),
            });
        }

        let dynamic_attributes = normalize_columns(self.sql_mapping, entity, "sql_mapping")?;
        let member_attributes = normalize_columns(self.member_mapping, entity, "member_mapping")?;

        let naming_column = dynamic_attributes
            .iter()
            .find(|(attr, _)| *attr == naming_attribute)
            .map(|(_, column)| column.clone())
            .ok_or_else(|| ConfigError::UnmappedNamingAttribute {
                entity,
                attribute: naming_attribute.clone(),
            })?;

        let mut static_attributes = AttributeMap::new();
        for (name, value) in self.static_mapping {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: format!("{entity}.static_mapping"),
                    message: "attribute names must not be empty".into(),
                });
            }
            static_attributes.insert(&name, value);
        }

        let query = self
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                key: format!("{entity}.query"),
            })?;

        Ok(MappingRule {
            naming_attribute,
            naming_column,
            ou,
            static_attributes,
            dynamic_attributes,
            member_attributes,
            query,
        })
    }
}

fn normalize_columns(
    mapping: BTreeMap<String, String>,
    entity: &'static str,
    section: &str,
) -> Result<Vec<(String, String)>, ConfigError> {
    let mut normalized: Vec<(String, String)> = Vec::with_capacity(mapping.len());
    for (attribute, column) in mapping {
        let attribute = AttributeMap::normalize_name(&attribute);
        let column = column.trim().to_string();
        if attribute.is_empty() || column.is_empty() {
            return Err(ConfigError::Invalid {
                key: format!("{entity}.{section}"),
                message: "attribute and column names must not be empty".into(),
            });
        }
        if normalized.iter().any(|(existing, _)| *existing == attribute) {
            return Err(ConfigError::Invalid {
                key: format!("{entity}.{section}"),
                message: format!("attribute '{attribute}' is mapped more than once"),
            });
        }
        normalized.push((attribute, column));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "base_dn": "dc=example, dc=com",
            "base_dc": "example",
            "users": {
                "ou": "ou=users",
                "rdn": "cn",
                "static_mapping": { "objectclass": "inetOrgPerson" },
                "sql_mapping": {
                    "cn": "full_name",
                    "uid": "username",
                    "givenName": "first_name",
                    "sn": "last_name",
                    "userPassword": "password"
                },
                "query": "SELECT * FROM users"
            },
            "groups": {
                "ou": "ou=groups",
                "rdn": "cn",
                "static_mapping": { "objectclass": ["groupOfURLs", "top"] },
                "sql_mapping": { "cn": "name", "description": "name" },
                "member_mapping": { "memberURL": "username" },
                "query": "SELECT * FROM groups"
            },
            "sync": { "timeout": 60000 }
        })
    }

    fn parse(value: serde_json::Value) -> Result<DirectorySettings, ConfigError> {
        DirectoryConfig::from_json_str(&value.to_string())?.validate()
    }

    #[test]
    fn test_validate_normalizes_names() {
        let settings = parse(sample()).unwrap();
        assert_eq!(settings.base_dn, "dc=example,dc=com");
        assert_eq!(settings.users.ou, "users");
        assert_eq!(settings.users.naming_column, "full_name");
        assert!(settings
            .users
            .dynamic_attributes
            .contains(&("userpassword".to_string(), "password".to_string())));
        assert_eq!(
            settings.groups.member_attributes,
            vec![("memberurl".to_string(), "username".to_string())]
        );
        assert_eq!(settings.member_of_attribute, "memberof");
        assert_eq!(settings.refresh_interval(), Duration::from_secs(60));
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(settings.server.listen_port, 1389);
        assert_eq!(settings.groups_ou_dn(), "ou=groups,dc=example,dc=com");
    }

    #[test]
    fn test_naming_attribute_requires_mapping() {
        let mut value = sample();
        value["users"]["rdn"] = json!("mail");
        match parse(value) {
            Err(ConfigError::UnmappedNamingAttribute { entity, attribute }) => {
                assert_eq!(entity, "users");
                assert_eq!(attribute, "mail");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_query_rejected() {
        let mut value = sample();
        value["groups"]["query"] = json!(null);
        assert!(matches!(parse(value), Err(ConfigError::Missing { key }) if key == "groups.query"));
    }

    #[test]
    fn test_duplicate_attribute_case_rejected() {
        let mut value = sample();
        value["users"]["sql_mapping"]["CN"] = json!("other");
        assert!(matches!(parse(value), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_shared_ou_rejected() {
        for groups_ou in ["users", "People", "OU=people "] {
            let mut value = sample();
            value["users"]["ou"] = json!(if groups_ou == "users" { "users" } else { "people" });
            value["groups"]["ou"] = json!(groups_ou);
            assert!(
                matches!(parse(value), Err(ConfigError::Invalid { ref key, .. }) if key == "groups.ou"),
                "{groups_ou}"
            );
        }

        let mut value = sample();
        value["groups"]["ou"] = json!("people");
        assert!(parse(value).is_ok());
    }

    #[test]
    fn test_member_mapping_on_users_rejected() {
        let mut value = sample();
        value["users"]["member_mapping"] = json!({ "member": "x" });
        assert!(matches!(parse(value), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_malformed_base_dn_rejected() {
        let mut value = sample();
        value["base_dn"] = json!("example.com");
        assert!(matches!(parse(value), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let sql = SqlConfig {
            password: "hunter2".into(),
            ..SqlConfig::default()
        };
        assert!(!format!("{sql:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_load_reads_query_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.sql"), "SELECT * FROM users\n").unwrap();
        std::fs::write(dir.path().join("groups.sql"), "SELECT * FROM groups\n").unwrap();

        let mut value = sample();
        value["users"]["query"] = json!(null);
        value["users"]["query_file"] = json!("users.sql");
        value["groups"]["query"] = json!(null);
        value["groups"]["query_file"] = json!("groups.sql");
        let path = dir.path().join("config.json");
        std::fs::write(&path, value.to_string()).unwrap();

        let settings = DirectoryConfig::load(&path).await.unwrap();
        assert_eq!(settings.users.query, "SELECT * FROM users");
        assert_eq!(settings.groups.query, "SELECT * FROM groups");
    }

    #[tokio::test]
    async fn test_load_reports_missing_file() {
        let err = DirectoryConfig::load("/nonexistent/config.json")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

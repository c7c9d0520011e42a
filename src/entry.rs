//! Directory entries and their attribute bags.
//!
//! Attribute names are case-insensitive in LDAP. [`AttributeMap`] enforces
//! that by storing every name in lowercase, so lookups such as "does this
//! entry carry a `userPassword`" work regardless of how the mapping rules
//! spelled the attribute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::slice;

/// Value of a single attribute: one string or several.
///
/// Deserializes from either a JSON string or an array of strings, which is
/// how static attribute values are written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttributeValue {
    /// All values as a slice, regardless of arity.
    pub fn as_slice(&self) -> &[String] {
        match self {
            AttributeValue::Single(value) => slice::from_ref(value),
            AttributeValue::Multi(values) => values,
        }
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        self.as_slice().first().map(String::as_str)
    }

    /// Whether `value` is one of the values.
    pub fn contains(&self, value: &str) -> bool {
        self.as_slice().iter().any(|v| v == value)
    }

    /// Add a value, promoting a single value to multi-valued.
    pub fn push(&mut self, value: String) {
        match self {
            AttributeValue::Single(existing) => {
                let existing = std::mem::take(existing);
                *self = AttributeValue::Multi(vec![existing, value]);
            }
            AttributeValue::Multi(values) => values.push(value),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Single(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Single(value.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for AttributeValue {
    fn from(values: [&str; N]) -> Self {
        AttributeValue::Multi(values.iter().map(|v| v.to_string()).collect())
    }
}

/// Attribute name to value(s), keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    attributes: BTreeMap<String, AttributeValue>,
}

impl AttributeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of an attribute name.
    pub fn normalize_name(name: &str) -> String {
        name.trim().to_ascii_lowercase()
    }

    /// Set an attribute, replacing any previous value.
    pub fn insert(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.attributes
            .insert(Self::normalize_name(name), value.into());
    }

    /// Append a value unless it is already present.
    pub fn append_unique(&mut self, name: &str, value: String) {
        match self.attributes.get_mut(&Self::normalize_name(name)) {
            Some(existing) if existing.contains(&value) => {}
            Some(existing) => existing.push(value),
            None => {
                self.attributes
                    .insert(Self::normalize_name(name), AttributeValue::Multi(vec![value]));
            }
        }
    }

    /// Look up an attribute by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(&Self::normalize_name(name))
    }

    /// Values of an attribute, empty when absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.get(name).map(AttributeValue::as_slice).unwrap_or(&[])
    }

    /// Whether the attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<AttributeValue>> FromIterator<(N, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (name, value) in iter {
            map.insert(name.as_ref(), value);
        }
        map
    }
}

/// A directory entry as served to clients.
///
/// Entries are built once per refresh and never modified after the snapshot
/// holding them is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name as presented to clients
    pub dn: String,
    /// Attributes keyed by lowercase name
    pub attributes: AttributeMap,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Values of an attribute, empty when absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes.values(name)
    }

    /// First value of an attribute.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttributeValue::first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let mut attrs = AttributeMap::new();
        attrs.insert("userPassword", "secret");
        assert!(attrs.contains("userpassword"));
        assert!(attrs.contains("USERPASSWORD"));
        assert_eq!(attrs.iter().next().map(|(k, _)| k), Some("userpassword"));
    }

    #[test]
    fn append_unique_promotes_and_deduplicates() {
        let mut attrs = AttributeMap::new();
        attrs.insert("member", "cn=a");
        attrs.append_unique("Member", "cn=b".to_string());
        attrs.append_unique("member", "cn=a".to_string());
        assert_eq!(attrs.values("member"), ["cn=a", "cn=b"]);

        attrs.append_unique("memberOf", "cn=g".to_string());
        assert_eq!(
            attrs.get("memberof"),
            Some(&AttributeValue::Multi(vec!["cn=g".to_string()]))
        );
    }

    #[test]
    fn static_values_deserialize_from_string_or_array() {
        let single: AttributeValue = serde_json::from_str(r#""inetOrgPerson""#).unwrap();
        let multi: AttributeValue = serde_json::from_str(r#"["groupOfURLs", "top"]"#).unwrap();
        assert_eq!(single.as_slice(), ["inetOrgPerson"]);
        assert_eq!(multi.as_slice(), ["groupOfURLs", "top"]);
        assert_eq!(multi.first(), Some("groupOfURLs"));
    }

    #[test]
    fn missing_attribute_has_no_values() {
        let entry = DirectoryEntry::new("cn=x", AttributeMap::new());
        assert!(entry.values("cn").is_empty());
        assert_eq!(entry.first_value("cn"), None);
    }
}

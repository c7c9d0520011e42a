//! Row to entry mapping.
//!
//! Turns one relational row into a directory entry using a [`MappingRule`]:
//! dynamic attributes are copied from their source columns when present,
//! static attributes are overlaid afterwards and always win.

use crate::config::MappingRule;
use crate::dn;
use crate::entry::{AttributeMap, DirectoryEntry};
use crate::error::BuildError;
use crate::store::Row;

/// Map a row's columns onto attributes.
///
/// Columns that are absent or `NULL` leave their attribute out entirely.
pub fn map_attributes(row: &Row, rule: &MappingRule) -> AttributeMap {
    let mut attributes = AttributeMap::new();

    for (attribute, column) in &rule.dynamic_attributes {
        if let Some(value) = row.get(column) {
            attributes.insert(attribute, value);
        }
    }

    for (attribute, value) in rule.static_attributes.iter() {
        attributes.insert(attribute, value.clone());
    }

    attributes
}

/// Naming value of a row, or why the row cannot be named.
pub fn naming_value<'r>(
    row: &'r Row,
    rule: &MappingRule,
    entity: &'static str,
) -> Result<&'r str, BuildError> {
    row.get(&rule.naming_column)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| BuildError::MissingNamingColumn {
            entity,
            column: rule.naming_column.clone(),
        })
}

/// Build the entry for a row.
pub fn map_entry(
    row: &Row,
    rule: &MappingRule,
    base_dn: &str,
    entity: &'static str,
) -> Result<DirectoryEntry, BuildError> {
    let value = naming_value(row, rule, entity)?;
    let dn = dn::leaf_dn(&rule.naming_attribute, value, &rule.ou, base_dn);
    Ok(DirectoryEntry::new(dn, map_attributes(row, rule)))
}

/// Member references carried by a group row.
///
/// Each member column holds the naming value of a user; the reference is the
/// DN that user would have. Whether the user exists is decided by the caller.
pub fn member_references(
    row: &Row,
    group_rule: &MappingRule,
    user_rule: &MappingRule,
    base_dn: &str,
) -> Vec<(String, String)> {
    group_rule
        .member_attributes
        .iter()
        .filter_map(|(attribute, column)| {
            row.get(column)
                .filter(|value| !value.trim().is_empty())
                .map(|value| {
                    (
                        attribute.clone(),
                        dn::leaf_dn(&user_rule.naming_attribute, value, &user_rule.ou, base_dn),
                    )
                })
        })
        .collect()
}

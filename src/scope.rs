//! Scope resolution: which entries a search may consider before filtering.

use crate::dn;
use crate::entry::DirectoryEntry;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search breadth relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The base entry only
    Base,
    /// Direct children of the base entry
    One,
    /// The base entry and everything below it
    Sub,
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" | "baseobject" => Ok(Scope::Base),
            "one" | "onelevel" | "singlelevel" => Ok(Scope::One),
            "sub" | "subtree" | "wholesubtree" => Ok(Scope::Sub),
            other => Err(format!("unknown search scope '{other}'")),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Base => "base",
            Scope::One => "one",
            Scope::Sub => "sub",
        })
    }
}

/// Entries of `snapshot` within `scope` of `base_dn`, ordered by normalized DN.
///
/// Placeholders (root and OUs) take part like any other entry. A base DN that
/// is neither in the tree nor above it yields nothing.
pub fn resolve<'a>(snapshot: &'a Snapshot, base_dn: &str, scope: Scope) -> Vec<&'a DirectoryEntry> {
    let base = dn::normalize(base_dn);

    let mut candidates: Vec<(String, &DirectoryEntry)> = snapshot
        .entries()
        .filter(|(key, _)| match scope {
            Scope::Base => *key == base,
            Scope::One => dn::parent(key) == Some(base.as_str()),
            Scope::Sub => dn::is_descendant_or_self(key, &base),
        })
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates.into_iter().map(|(_, entry)| entry).collect()
}

/// Whether `base_dn` names an entry of the snapshot.
pub fn exists(snapshot: &Snapshot, base_dn: &str) -> bool {
    let base = dn::normalize(base_dn);
    snapshot.entries().any(|(key, _)| key == base)
}

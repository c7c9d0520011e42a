//! Immutable directory snapshots.
//!
//! A [`Snapshot`] is the whole directory as of one refresh: the root entry,
//! the two organizational units, every user and every group. It is built in
//! one pass from the users and groups result sets and is never modified
//! afterwards; the next refresh builds a new one.
//!
//! # Build rules
//!
//! * each user row becomes one entry keyed by its normalized DN; a second row
//!   with the same DN is skipped
//! * group rows sharing a DN fold into one entry whose member attributes
//!   accumulate the members of every row
//! * each member reference that names a user present in this snapshot adds
//!   the group's DN to that user's member-of attribute; references to absent
//!   users stay on the group and add nothing else
//! * rows without a naming value are skipped

use crate::config::DirectorySettings;
use crate::dn;
use crate::entry::{AttributeMap, DirectoryEntry};
use crate::error::BuildError;
use crate::mapping;
use crate::store::Row;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Counters describing one snapshot build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub users: usize,
    pub groups: usize,
    /// Rows dropped for lacking a naming value
    pub skipped_rows: usize,
    /// User rows dropped because their DN was already taken
    pub duplicate_users: usize,
    /// Member references to users not in the snapshot
    pub dangling_members: usize,
}

/// The directory at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    base_dn: String,
    root: DirectoryEntry,
    users_ou: DirectoryEntry,
    groups_ou: DirectoryEntry,
    users: BTreeMap<String, DirectoryEntry>,
    groups: BTreeMap<String, DirectoryEntry>,
}

impl Snapshot {
    /// A snapshot with only the root and OU entries.
    ///
    /// Served until the first refresh completes.
    pub fn empty(settings: &DirectorySettings) -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            base_dn: settings.base_dn.clone(),
            root: root_entry(settings),
            users_ou: ou_entry(&settings.users.ou, &settings.base_dn),
            groups_ou: ou_entry(&settings.groups.ou, &settings.base_dn),
            users: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Build a snapshot from the users and groups result sets.
    pub fn build(
        settings: &DirectorySettings,
        user_rows: &[Row],
        group_rows: &[Row],
        generation: u64,
    ) -> (Self, BuildReport) {
        let mut report = BuildReport::default();
        let mut snapshot = Self::empty(settings);
        snapshot.generation = generation;

        for row in user_rows {
            match mapping::map_entry(row, &settings.users, &settings.base_dn, "users") {
                Ok(entry) => {
                    let key = dn::normalize(&entry.dn);
                    if snapshot.users.contains_key(&key) {
                        warn!("Skipping user row: duplicate DN '{}'", entry.dn);
                        report.duplicate_users += 1;
                    } else {
                        snapshot.users.insert(key, entry);
                    }
                }
                Err(err) => skip_row(&mut report, err),
            }
        }

        // user key -> group DNs, applied once every group is folded
        let mut member_of: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for row in group_rows {
            let value = match mapping::naming_value(row, &settings.groups, "groups") {
                Ok(value) => value,
                Err(err) => {
                    skip_row(&mut report, err);
                    continue;
                }
            };
            let group_dn = dn::leaf_dn(
                &settings.groups.naming_attribute,
                value,
                &settings.groups.ou,
                &settings.base_dn,
            );
            let group = snapshot
                .groups
                .entry(dn::normalize(&group_dn))
                .or_insert_with(|| {
                    DirectoryEntry::new(
                        group_dn.clone(),
                        mapping::map_attributes(row, &settings.groups),
                    )
                });

            for (attribute, member_dn) in
                mapping::member_references(row, &settings.groups, &settings.users, &settings.base_dn)
            {
                let member_key = dn::normalize(&member_dn);
                if snapshot.users.contains_key(&member_key) {
                    member_of
                        .entry(member_key)
                        .or_default()
                        .push(group.dn.clone());
                } else {
                    debug!("Group '{}' references unknown member '{}'", group.dn, member_dn);
                    report.dangling_members += 1;
                }
                group.attributes.append_unique(&attribute, member_dn);
            }
        }

        for (user_key, group_dns) in member_of {
            if let Some(user) = snapshot.users.get_mut(&user_key) {
                for group_dn in group_dns {
                    user.attributes
                        .append_unique(&settings.member_of_attribute, group_dn);
                }
            }
        }

        report.users = snapshot.users.len();
        report.groups = snapshot.groups.len();
        (snapshot, report)
    }

    /// Refresh counter; 0 for the initial empty snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// User entries keyed by normalized DN.
    pub fn users(&self) -> &BTreeMap<String, DirectoryEntry> {
        &self.users
    }

    /// Group entries keyed by normalized DN.
    pub fn groups(&self) -> &BTreeMap<String, DirectoryEntry> {
        &self.groups
    }

    /// Exact user lookup; `dn` may be in any case or spacing.
    pub fn user(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.users.get(&dn::normalize(dn))
    }

    /// Exact group lookup.
    pub fn group(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.groups.get(&dn::normalize(dn))
    }

    /// Root and OU entries.
    pub fn placeholders(&self) -> [&DirectoryEntry; 3] {
        [&self.root, &self.users_ou, &self.groups_ou]
    }

    /// Every entry with its normalized DN, placeholders first.
    pub fn entries(&self) -> impl Iterator<Item = (String, &DirectoryEntry)> {
        self.placeholders()
            .into_iter()
            .map(|entry| (dn::normalize(&entry.dn), entry))
            .chain(self.users.iter().map(|(k, v)| (k.clone(), v)))
            .chain(self.groups.iter().map(|(k, v)| (k.clone(), v)))
    }

    /// Whether two snapshots hold the same entries, ignoring generation and
    /// build time.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.users == other.users
            && self.groups == other.groups
            && self.placeholders() == other.placeholders()
    }
}

fn skip_row(report: &mut BuildReport, err: BuildError) {
    warn!("Skipping row: {}", err);
    report.skipped_rows += 1;
}

fn root_entry(settings: &DirectorySettings) -> DirectoryEntry {
    let mut attributes = AttributeMap::new();
    attributes.insert("dc", settings.base_dc.as_str());
    attributes.insert("objectClass", ["dcObject", "organization"]);
    attributes.insert("hasSubordinates", "TRUE");
    DirectoryEntry::new(settings.base_dn.clone(), attributes)
}

fn ou_entry(ou: &str, base_dn: &str) -> DirectoryEntry {
    let mut attributes = AttributeMap::new();
    attributes.insert("ou", ou);
    attributes.insert("objectClass", ["top", "organizationalUnit"]);
    attributes.insert("hasSubordinates", "TRUE");
    DirectoryEntry::new(dn::ou_dn(ou, base_dn), attributes)
}

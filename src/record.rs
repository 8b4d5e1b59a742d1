//! Typed directory records built from search result entries.

use ldap3::SearchEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::errors::{Result, WhoamiError};
use crate::ldap_helpers::{attrs, AttrValue, SearchEntryExt};
use crate::sid::SecurityIdentifier;

/// A user or group as the run reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRecord {
    pub distinguished_name: String,
    pub account_name: String,
    pub security_identifier: SecurityIdentifier,
}

impl DirectoryRecord {
    /// Maps one search result entry. `distinguishedName`, `sAMAccountName` and
    /// `objectSid` are all required.
    pub fn from_entry(entry: &SearchEntry) -> Result<Self> {
        let distinguished_name = entry.get_dn();
        if distinguished_name.is_empty() {
            return Err(WhoamiError::missing_attribute(
                "(unnamed entry)",
                attrs::DISTINGUISHED_NAME,
            ));
        }

        let account_name = entry
            .get_optional_attr(attrs::SAM_ACCOUNT_NAME)
            .ok_or_else(|| {
                WhoamiError::missing_attribute(&distinguished_name, attrs::SAM_ACCOUNT_NAME)
            })?;

        let security_identifier = match entry.get_raw_attr(attrs::OBJECT_SID) {
            Some(AttrValue::Binary(bytes)) => SecurityIdentifier::decode(bytes)?,
            Some(AttrValue::Text(text)) => {
                // ldap3 keeps any value that is valid UTF-8 as a String, so the
                // string's bytes are exactly the bytes the server sent
                warn!(
                    "objectSid of {} arrived as text, re-reading its bytes",
                    distinguished_name
                );
                SecurityIdentifier::decode_quirky(text.as_bytes())?
            }
            None => {
                return Err(WhoamiError::missing_attribute(
                    &distinguished_name,
                    attrs::OBJECT_SID,
                ))
            }
        };

        Ok(Self {
            distinguished_name,
            account_name,
            security_identifier,
        })
    }
}

/// The user's `primaryGroupID`, the RID of its primary group.
pub fn primary_group_id(entry: &SearchEntry) -> Result<u32> {
    let value = entry
        .get_optional_attr(attrs::PRIMARY_GROUP_ID)
        .ok_or_else(|| WhoamiError::missing_attribute(&entry.get_dn(), attrs::PRIMARY_GROUP_ID))?;
    value.trim().parse().map_err(|_| {
        WhoamiError::Decode(format!(
            "{} of {} is not a RID: '{}'",
            attrs::PRIMARY_GROUP_ID,
            entry.get_dn(),
            value
        ))
    })
}

/// Groups keyed by distinguished name. A DN is stored once; later inserts of
/// the same DN are refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSet {
    groups: BTreeMap<String, DirectoryRecord>,
}

impl GroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record unless its DN is already present.
    /// Returns whether it was inserted.
    pub fn insert(&mut self, record: DirectoryRecord) -> bool {
        if self.groups.contains_key(&record.distinguished_name) {
            return false;
        }
        self.groups
            .insert(record.distinguished_name.clone(), record);
        true
    }

    pub fn contains(&self, distinguished_name: &str) -> bool {
        self.groups.contains_key(distinguished_name)
    }

    pub fn get(&self, distinguished_name: &str) -> Option<&DirectoryRecord> {
        self.groups.get(distinguished_name)
    }

    pub fn remove(&mut self, distinguished_name: &str) -> Option<DirectoryRecord> {
        self.groups.remove(distinguished_name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Records ordered by DN
    pub fn iter(&self) -> impl Iterator<Item = &DirectoryRecord> {
        self.groups.values()
    }

    /// Moves every record of `other` in, keeping existing entries on conflict.
    pub fn merge(&mut self, other: GroupSet) {
        for record in other.groups.into_values() {
            self.insert(record);
        }
    }
}

impl Serialize for GroupSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.groups.values())
    }
}

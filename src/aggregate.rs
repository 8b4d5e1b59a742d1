//! Merges the primary group with the walked groups.
//!
//! The primary group is recorded on the user (`primaryGroupID`), not as a
//! `member` value on the group, so the walk alone does not find it.

use serde::Serialize;
use tracing::warn;

use crate::record::{DirectoryRecord, GroupSet};

/// Final group membership of the user
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedGroups {
    /// DN of the primary group within `groups`
    pub primary_group_dn: String,
    pub groups: GroupSet,
}

impl AggregatedGroups {
    pub fn primary_group(&self) -> Option<&DirectoryRecord> {
        self.groups.get(&self.primary_group_dn)
    }
}

/// Builds the final set: primary group first, then every walked group whose
/// DN is not already present. The user itself is never part of the set.
pub fn aggregate(
    user: &DirectoryRecord,
    primary_group: DirectoryRecord,
    walked: GroupSet,
) -> AggregatedGroups {
    let primary_group_dn = primary_group.distinguished_name.clone();

    let mut groups = GroupSet::new();
    groups.insert(primary_group);
    groups.merge(walked);

    if groups.remove(&user.distinguished_name).is_some() {
        warn!(
            "{} appears as a group of itself, dropping it",
            user.distinguished_name
        );
    }

    AggregatedGroups {
        primary_group_dn,
        groups,
    }
}

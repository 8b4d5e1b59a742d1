//! Transitive group membership over the `member` attribute.
//!
//! Starting from one or more member DNs, repeatedly asks the directory for
//! the groups listing a DN in `member`, then asks the same of every group not
//! seen before. The [`GroupSet`] doubles as the visited set: a DN already in
//! it is never queued again, so cycles terminate and the number of searches
//! is bounded by the number of distinct groups plus the starting DNs.
//!
//! Traversal is depth-first on an explicit stack; callers must not rely on
//! discovery order.

use ldap3::Scope;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::directory::DirectorySession;
use crate::errors::Result;
use crate::ldap_helpers::attr_lists;
use crate::ldap_utils::filters;
use crate::record::{DirectoryRecord, GroupSet};

/// Traversal counters, reported with verbose output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Directory searches issued
    pub searches: usize,
    /// Groups added to the set by the walk
    pub groups_discovered: usize,
    /// Search results naming a group already in the set (cycles and diamonds)
    pub revisits: usize,
}

/// Result of a completed walk
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub groups: GroupSet,
    pub stats: WalkStats,
}

/// Walks group membership for one run against one session.
pub struct GroupWalker<'a, S: DirectorySession + ?Sized> {
    session: &'a mut S,
    base_dn: &'a str,
}

impl<'a, S: DirectorySession + ?Sized> GroupWalker<'a, S> {
    /// `base_dn` is the subtree searched for groups, normally the domain's
    /// default naming context.
    pub fn new(session: &'a mut S, base_dn: &'a str) -> Self {
        Self { session, base_dn }
    }

    /// Computes every group reachable from `start_dns` through `member`.
    ///
    /// Groups already in `seed` count as visited: they are kept in the result
    /// and not expanded, unless they are also listed in `start_dns`.
    /// Any failed search or unmappable entry aborts the whole walk.
    #[instrument(skip(self, seed), fields(base_dn = %self.base_dn, seeded = seed.len()))]
    pub async fn walk(&mut self, start_dns: &[String], seed: GroupSet) -> Result<WalkOutcome> {
        let mut groups = seed;
        let mut stats = WalkStats::default();
        let mut expanded: HashSet<String> = HashSet::new();
        let mut pending: Vec<String> = start_dns.iter().rev().cloned().collect();

        while let Some(member_dn) = pending.pop() {
            if !expanded.insert(member_dn.clone()) {
                continue;
            }

            let filter = filters::groups_with_member(&member_dn);
            debug!("Searching groups with member {}", member_dn);
            let entries = self
                .session
                .search(self.base_dn, &filter, Scope::Subtree, attr_lists::GROUP)
                .await?;
            stats.searches += 1;

            for entry in &entries {
                let record = DirectoryRecord::from_entry(entry)?;
                let group_dn = record.distinguished_name.clone();
                if groups.insert(record) {
                    debug!("{} is a member of {}", member_dn, group_dn);
                    stats.groups_discovered += 1;
                    pending.push(group_dn);
                } else {
                    debug!("{} already collected, not expanding again", group_dn);
                    stats.revisits += 1;
                }
            }
        }

        info!(
            searches = stats.searches,
            groups = groups.len(),
            revisits = stats.revisits,
            "Group membership walk complete"
        );

        Ok(WalkOutcome { groups, stats })
    }
}

//! One who-am-I run, from the extended operation to the aggregated groups.
//!
//! Every step awaits the previous one on the same session. The first failure
//! ends the run and is returned as is.

use chrono::{DateTime, Utc};
use ldap3::{Scope, SearchEntry};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{aggregate, AggregatedGroups};
use crate::config::RunConfig;
use crate::directory::DirectorySession;
use crate::errors::{Result, WhoamiError};
use crate::identity::Identity;
use crate::ldap_helpers::attr_lists;
use crate::ldap_utils::filters;
use crate::record::{primary_group_id, DirectoryRecord, GroupSet};
use crate::walker::{GroupWalker, WalkStats};

/// Everything a run found out
#[derive(Debug, Clone, Serialize)]
pub struct WhoamiReport {
    pub server: String,
    pub queried_at: DateTime<Utc>,
    pub identity: Identity,
    /// Present when user detail was requested
    pub user: Option<DirectoryRecord>,
    /// Present when group detail was requested
    pub groups: Option<AggregatedGroups>,
    pub walk_stats: Option<WalkStats>,
}

/// Runs the who-am-I operation and the lookups `config` asks for.
#[instrument(skip(session, config), fields(server = %config.server))]
pub async fn run<S>(session: &mut S, config: &RunConfig) -> Result<WhoamiReport>
where
    S: DirectorySession + ?Sized,
{
    let response = session.who_am_i().await?;
    debug!("Who-am-I response: {}", response);
    let identity = Identity::resolve(&response)?;
    info!("Authenticated as {}", identity);

    let mut report = WhoamiReport {
        server: config.server.clone(),
        queried_at: Utc::now(),
        identity,
        user: None,
        groups: None,
        walk_stats: None,
    };

    if !config.needs_directory_lookup() {
        return Ok(report);
    }

    let base_dn = resolve_base_dn(session, config).await?;
    info!("Using search base {}", base_dn);

    let (user, user_entry) = lookup_user(session, &base_dn, &report.identity).await?;
    info!("Found user {} ({})", user.distinguished_name, user.security_identifier);

    if config.show_groups {
        let rid = primary_group_id(&user_entry)?;
        let primary = lookup_primary_group(session, &base_dn, &user, rid).await?;
        info!("Primary group is {}", primary.distinguished_name);

        let mut start_dns = vec![user.distinguished_name.clone()];
        if config.expand_primary_group {
            start_dns.push(primary.distinguished_name.clone());
        }
        let mut seed = GroupSet::new();
        seed.insert(primary.clone());

        let outcome = GroupWalker::new(&mut *session, &base_dn)
            .walk(&start_dns, seed)
            .await?;

        report.groups = Some(aggregate(&user, primary, outcome.groups));
        report.walk_stats = Some(outcome.stats);
    }

    if config.show_user {
        report.user = Some(user);
    }

    Ok(report)
}

/// Configured base, else the RootDSE naming context, else the base suggested
/// by discovery.
async fn resolve_base_dn<S>(session: &mut S, config: &RunConfig) -> Result<String>
where
    S: DirectorySession + ?Sized,
{
    if let Some(base_dn) = &config.base_dn {
        return Ok(base_dn.clone());
    }

    match session.default_naming_context().await {
        Ok(naming_context) => Ok(naming_context),
        Err(e @ (WhoamiError::MissingAttribute { .. } | WhoamiError::NotFound(_))) => {
            match &config.fallback_base_dn {
                Some(fallback) => {
                    warn!("{}; falling back to {}", e, fallback);
                    Ok(fallback.clone())
                }
                None => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

async fn lookup_user<S>(
    session: &mut S,
    base_dn: &str,
    identity: &Identity,
) -> Result<(DirectoryRecord, SearchEntry)>
where
    S: DirectorySession + ?Sized,
{
    let filter = filters::user_by_account_name(&identity.account_name);
    let entries = session
        .search(base_dn, &filter, Scope::Subtree, attr_lists::USER)
        .await?;

    let entry = entries.into_iter().next().ok_or_else(|| {
        WhoamiError::NotFound(format!(
            "user {} not found under {}",
            identity.account_name, base_dn
        ))
    })?;
    let record = DirectoryRecord::from_entry(&entry)?;
    Ok((record, entry))
}

async fn lookup_primary_group<S>(
    session: &mut S,
    base_dn: &str,
    user: &DirectoryRecord,
    rid: u32,
) -> Result<DirectoryRecord>
where
    S: DirectorySession + ?Sized,
{
    let domain_sid = user.security_identifier.account_domain().ok_or_else(|| {
        WhoamiError::Decode(format!(
            "{} is not a domain account SID, cannot derive its primary group",
            user.security_identifier
        ))
    })?;
    let group_sid = domain_sid.with_rid(rid)?;

    let filter = filters::group_by_sid(&group_sid);
    let entries = session
        .search(base_dn, &filter, Scope::Subtree, attr_lists::GROUP)
        .await?;

    let entry = entries.first().ok_or_else(|| {
        WhoamiError::NotFound(format!("primary group {} not found", group_sid))
    })?;
    DirectoryRecord::from_entry(entry)
}

//! The directory operations a who-am-I run consumes.
//!
//! [`crate::session::LdapSession`] implements this over a live ldap3
//! connection. Implementations issue one request at a time and return only
//! complete results: a search either yields every entry or fails.

use async_trait::async_trait;
use ldap3::{Scope, SearchEntry};

use crate::errors::{Result, WhoamiError};
use crate::ldap_helpers::{attr_lists, attrs, SearchEntryExt};
use crate::ldap_utils::filters;

/// OID of the "Who am I?" extended operation (RFC 4532)
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

#[async_trait]
pub trait DirectorySession: Send {
    /// Runs the who-am-I extended operation and returns the authorization
    /// identity as text.
    async fn who_am_i(&mut self) -> Result<String>;

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        scope: Scope,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>>;

    /// Reads `defaultNamingContext` from the RootDSE.
    async fn default_naming_context(&mut self) -> Result<String> {
        let entries = self
            .search("", filters::ANY_OBJECT, Scope::Base, attr_lists::ROOT_DSE)
            .await?;
        let root_dse = entries
            .first()
            .ok_or_else(|| WhoamiError::NotFound("RootDSE returned no entry".to_string()))?;
        root_dse
            .get_optional_attr(attrs::DEFAULT_NAMING_CONTEXT)
            .filter(|nc| !nc.is_empty())
            .ok_or_else(|| WhoamiError::missing_attribute("RootDSE", attrs::DEFAULT_NAMING_CONTEXT))
    }
}

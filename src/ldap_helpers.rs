//! LDAP Helper Utilities
//!
//! Extension trait and constants for pulling attributes out of search results.
//!
//! Attribute descriptions are case-insensitive in LDAP, and servers do not
//! always echo the case a client asked for (`DefaultNamingContext` comes back
//! as `defaultNamingContext`), so every lookup here ignores case.

use ldap3::SearchEntry;

/// A single attribute value as ldap3 delivered it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrValue<'a> {
    /// Valid UTF-8 on the wire, found in `attrs`
    Text(&'a str),
    /// Not valid UTF-8, found in `bin_attrs`
    Binary(&'a [u8]),
}

/// Extension trait for SearchEntry to simplify attribute extraction
pub trait SearchEntryExt {
    /// First textual value of an attribute
    fn get_optional_attr(&self, name: &str) -> Option<String>;

    /// First value of an attribute, whichever map it landed in
    fn get_raw_attr(&self, name: &str) -> Option<AttrValue<'_>>;

    /// The entry's distinguishedName attribute, else the DN the server
    /// returned with the entry
    fn get_dn(&self) -> String;
}

fn first_value<'a, V>(
    map: &'a std::collections::HashMap<String, Vec<V>>,
    name: &str,
) -> Option<&'a V> {
    map.get(name)
        .or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .and_then(|v| v.first())
}

impl SearchEntryExt for SearchEntry {
    fn get_optional_attr(&self, name: &str) -> Option<String> {
        first_value(&self.attrs, name).cloned()
    }

    fn get_raw_attr(&self, name: &str) -> Option<AttrValue<'_>> {
        if let Some(bytes) = first_value(&self.bin_attrs, name) {
            return Some(AttrValue::Binary(bytes.as_slice()));
        }
        first_value(&self.attrs, name).map(|s| AttrValue::Text(s.as_str()))
    }

    fn get_dn(&self) -> String {
        self.get_optional_attr(attrs::DISTINGUISHED_NAME)
            .filter(|dn| !dn.is_empty())
            .unwrap_or_else(|| self.dn.clone())
    }
}

/// LDAP attribute names used by the run
pub mod attrs {
    pub const DISTINGUISHED_NAME: &str = "distinguishedName";
    pub const SAM_ACCOUNT_NAME: &str = "sAMAccountName";
    pub const OBJECT_SID: &str = "objectSid";
    pub const PRIMARY_GROUP_ID: &str = "primaryGroupID";

    // RootDSE
    pub const DEFAULT_NAMING_CONTEXT: &str = "defaultNamingContext";
}

/// Standard attribute lists for the run's queries
pub mod attr_lists {
    /// User lookup
    pub const USER: &[&str] = &[
        "objectSid",
        "primaryGroupID",
        "distinguishedName",
        "sAMAccountName",
    ];

    /// Group lookups (primary group and membership walk)
    pub const GROUP: &[&str] = &["sAMAccountName", "objectSid", "distinguishedName"];

    /// RootDSE read
    pub const ROOT_DSE: &[&str] = &["defaultNamingContext"];
}

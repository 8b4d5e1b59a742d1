//! In-memory directory for driving runs without a server.

#![allow(dead_code)]

use async_trait::async_trait;
use ldap3::{Scope, SearchEntry};
use ldap_whoami::config::RunConfig;
use ldap_whoami::sid::SecurityIdentifier;
use ldap_whoami::{DirectorySession, Result, WhoamiError};
use std::collections::HashMap;

pub const BASE_DN: &str = "DC=example,DC=com";

/// Sub-authorities with bytes that are not valid UTF-8, as real domains have
pub const DOMAIN_SID: &str = "S-1-5-21-3623811015-3361044348-30300820";

#[derive(Debug, Clone)]
struct MockObject {
    dn: String,
    account_name: String,
    sid: SecurityIdentifier,
    is_group: bool,
    members: Vec<String>,
    primary_group_id: Option<u32>,
    textual_sid: bool,
}

impl MockObject {
    fn to_entry(&self) -> SearchEntry {
        let mut attrs = HashMap::new();
        let mut bin_attrs = HashMap::new();
        attrs.insert("distinguishedName".to_string(), vec![self.dn.clone()]);
        attrs.insert("sAMAccountName".to_string(), vec![self.account_name.clone()]);
        if let Some(rid) = self.primary_group_id {
            attrs.insert("primaryGroupID".to_string(), vec![rid.to_string()]);
        }
        let sid = self.sid.to_bytes();
        if self.textual_sid {
            let text = String::from_utf8(sid).expect("textual SID fixture must be valid UTF-8");
            attrs.insert("objectSid".to_string(), vec![text]);
        } else {
            bin_attrs.insert("objectSid".to_string(), vec![sid]);
        }
        SearchEntry {
            dn: self.dn.clone(),
            attrs,
            bin_attrs,
        }
    }
}

/// Reverses RFC 4515 `\xx` escapes.
fn unescape_filter_value(value: &str) -> String {
    let mut bytes = Vec::new();
    let raw = value.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 3 <= raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                bytes.push(b);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    String::from_utf8(bytes).expect("filter value is UTF-8")
}

pub struct MockDirectory {
    pub whoami_response: String,
    pub naming_context: Option<String>,
    domain_sid: SecurityIdentifier,
    objects: Vec<MockObject>,
    /// Every (base, filter) searched, in order
    pub searches: Vec<(String, String)>,
    member_searches: HashMap<String, usize>,
    /// Member DN whose group search fails
    pub fail_member_search_for: Option<String>,
}

impl MockDirectory {
    pub fn new(whoami_response: &str) -> Self {
        Self::with_domain(whoami_response, DOMAIN_SID)
    }

    pub fn with_domain(whoami_response: &str, domain_sid: &str) -> Self {
        Self {
            whoami_response: whoami_response.to_string(),
            naming_context: Some(BASE_DN.to_string()),
            domain_sid: domain_sid.parse().expect("valid domain SID"),
            objects: Vec::new(),
            searches: Vec::new(),
            member_searches: HashMap::new(),
            fail_member_search_for: None,
        }
    }

    pub fn sid_of(&self, rid: u32) -> SecurityIdentifier {
        self.domain_sid.with_rid(rid).expect("domain SID has room for a RID")
    }

    pub fn add_user(&mut self, account_name: &str, rid: u32, primary_group_id: u32) -> String {
        let dn = format!("CN={},CN=Users,{}", account_name, BASE_DN);
        self.objects.push(MockObject {
            dn: dn.clone(),
            account_name: account_name.to_string(),
            sid: self.sid_of(rid),
            is_group: false,
            members: Vec::new(),
            primary_group_id: Some(primary_group_id),
            textual_sid: false,
        });
        dn
    }

    pub fn add_group(&mut self, name: &str, rid: u32) -> String {
        let dn = format!("CN={},OU=Groups,{}", name, BASE_DN);
        self.objects.push(MockObject {
            dn: dn.clone(),
            account_name: name.to_string(),
            sid: self.sid_of(rid),
            is_group: true,
            members: Vec::new(),
            primary_group_id: None,
            textual_sid: false,
        });
        dn
    }

    /// Lists `member_dn` in the `member` attribute of `group_dn`.
    pub fn add_member(&mut self, group_dn: &str, member_dn: &str) {
        let group = self
            .objects
            .iter_mut()
            .find(|o| o.dn == group_dn)
            .expect("group exists");
        group.members.push(member_dn.to_string());
    }

    /// Serves the object's SID as a text value instead of a binary one.
    pub fn set_textual_sid(&mut self, dn: &str) {
        let object = self
            .objects
            .iter_mut()
            .find(|o| o.dn == dn)
            .expect("object exists");
        object.textual_sid = true;
    }

    /// Number of `member=<dn>` searches issued
    pub fn member_search_count(&self, member_dn: &str) -> usize {
        self.member_searches.get(member_dn).copied().unwrap_or(0)
    }

    pub fn total_member_searches(&self) -> usize {
        self.member_searches.values().sum()
    }

    fn entries<F: Fn(&MockObject) -> bool>(&self, predicate: F) -> Vec<SearchEntry> {
        self.objects
            .iter()
            .filter(|o| predicate(o))
            .map(MockObject::to_entry)
            .collect()
    }
}

#[async_trait]
impl DirectorySession for MockDirectory {
    async fn who_am_i(&mut self) -> Result<String> {
        Ok(self.whoami_response.clone())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        scope: Scope,
        _attrs: &[&str],
    ) -> Result<Vec<SearchEntry>> {
        self.searches.push((base_dn.to_string(), filter.to_string()));

        if matches!(scope, Scope::Base) {
            assert_eq!(filter, "(objectClass=*)");
            let mut attrs = HashMap::new();
            if let Some(nc) = &self.naming_context {
                attrs.insert("defaultNamingContext".to_string(), vec![nc.clone()]);
            }
            return Ok(vec![SearchEntry {
                dn: String::new(),
                attrs,
                bin_attrs: HashMap::new(),
            }]);
        }

        if let Some(value) = filter
            .strip_prefix("(&(objectClass=group)(member=")
            .and_then(|f| f.strip_suffix("))"))
        {
            let member = unescape_filter_value(value);
            *self.member_searches.entry(member.clone()).or_default() += 1;
            if self.fail_member_search_for.as_deref() == Some(member.as_str()) {
                return Err(WhoamiError::Directory("unwillingToPerform".to_string()));
            }
            return Ok(self.entries(|o| o.is_group && o.members.contains(&member)));
        }

        if let Some(value) = filter
            .strip_prefix("(&(objectClass=user)(sAMAccountName=")
            .and_then(|f| f.strip_suffix("))"))
        {
            let name = unescape_filter_value(value);
            return Ok(self.entries(|o| !o.is_group && o.account_name.eq_ignore_ascii_case(&name)));
        }

        if let Some(value) = filter
            .strip_prefix("(&(objectClass=group)(objectSid=")
            .and_then(|f| f.strip_suffix("))"))
        {
            return Ok(self.entries(|o| o.is_group && o.sid.to_string() == value));
        }

        panic!("unexpected filter {}", filter);
    }
}

/// Config for a run that asks for everything
pub fn full_config() -> RunConfig {
    let mut config = RunConfig::new("dc01.example.com");
    config.show_user = true;
    config.show_groups = true;
    config
}

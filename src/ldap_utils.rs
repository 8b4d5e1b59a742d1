//! LDAP Utilities
//!
//! RFC 4515 escaping and the search filters a who-am-I run issues.

use crate::sid::SecurityIdentifier;

/// Escapes a string for safe use in an LDAP search filter (RFC 4515).
///
/// The following characters are escaped:
/// - `*` (asterisk) -> `\2a`
/// - `(` (left parenthesis) -> `\28`
/// - `)` (right parenthesis) -> `\29`
/// - `\` (backslash) -> `\5c`
/// - `\0` (NUL) -> `\00`
///
/// # Examples
///
/// ```
/// use ldap_whoami::ldap_utils::escape_ldap_filter;
///
/// let safe = escape_ldap_filter("admin*");
/// assert_eq!(safe, "admin\\2a");
/// ```
pub fn escape_ldap_filter(input: &str) -> String {
    input.chars().fold(String::new(), |mut acc, c| {
        match c {
            '*' => acc.push_str("\\2a"),
            '(' => acc.push_str("\\28"),
            ')' => acc.push_str("\\29"),
            '\\' => acc.push_str("\\5c"),
            '\0' => acc.push_str("\\00"),
            _ => acc.push(c),
        }
        acc
    })
}

/// Search filters issued during a run
pub mod filters {
    use super::*;

    /// Matches every entry; used for RootDSE reads.
    pub const ANY_OBJECT: &str = "(objectClass=*)";

    /// The user object carrying the given sAMAccountName
    pub fn user_by_account_name(account_name: &str) -> String {
        format!(
            "(&(objectClass=user)(sAMAccountName={}))",
            escape_ldap_filter(account_name)
        )
    }

    /// The group carrying the given SID, in canonical text form
    pub fn group_by_sid(sid: &SecurityIdentifier) -> String {
        format!("(&(objectClass=group)(objectSid={}))", sid)
    }

    /// Groups listing `member_dn` in their `member` attribute
    pub fn groups_with_member(member_dn: &str) -> String {
        format!(
            "(&(objectClass=group)(member={}))",
            escape_ldap_filter(member_dn)
        )
    }
}

//! Domain controller discovery
//!
//! Picks the server to talk to when none was given. Only the outcome matters
//! here: a reachable endpoint or a [`WhoamiError::Discovery`].

use tracing::{debug, info};

use crate::errors::{Result, WhoamiError};

/// Windows sets this to `\\DC01` for domain logons
const LOGON_SERVER_VAR: &str = "LOGONSERVER";

/// DNS name of the logon domain; resolves to its domain controllers
const USER_DNS_DOMAIN_VAR: &str = "USERDNSDOMAIN";

/// Where to connect, and a search base to fall back on if the server's
/// RootDSE does not name one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    pub server: String,
    pub suggested_base_dn: Option<String>,
}

/// Resolves the server from the process environment.
pub fn resolve_server(explicit: Option<&str>) -> Result<DiscoveredServer> {
    resolve_server_with(explicit, |name| std::env::var(name).ok())
}

/// Resolution order: explicit server, logon server, user DNS domain.
///
/// A base DN is only suggested for discovered servers; an explicit server may
/// belong to any domain.
pub fn resolve_server_with<F>(explicit: Option<&str>, env: F) -> Result<DiscoveredServer>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(server) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        debug!("Using server from arguments: {}", server);
        return Ok(DiscoveredServer {
            server: server.to_string(),
            suggested_base_dn: None,
        });
    }

    info!("No server argument. Using current context to find domain controller.");

    let dns_domain = env(USER_DNS_DOMAIN_VAR)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let suggested_base_dn = dns_domain.as_deref().map(domain_to_base_dn);

    if let Some(dc) = env(LOGON_SERVER_VAR)
        .map(|s| s.trim_start_matches('\\').trim().to_string())
        .filter(|s| !s.is_empty())
    {
        info!("Found logon server {}", dc);
        return Ok(DiscoveredServer {
            server: dc,
            suggested_base_dn,
        });
    }
    debug!("{} not set", LOGON_SERVER_VAR);

    if let Some(domain) = dns_domain {
        info!("Using user DNS domain {}", domain);
        return Ok(DiscoveredServer {
            server: domain,
            suggested_base_dn,
        });
    }
    debug!("{} not set", USER_DNS_DOMAIN_VAR);

    Err(WhoamiError::Discovery(
        "no server specified and no domain controller found in the user's logon context"
            .to_string(),
    ))
}

/// Convert a DNS domain name to an LDAP base DN
/// e.g., "corp.example.com" -> "DC=corp,DC=example,DC=com"
pub fn domain_to_base_dn(domain: &str) -> String {
    domain
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| format!("DC={}", part))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_server_wins() {
        let env = env_of(&[("LOGONSERVER", "\\\\DC02")]);
        let found = resolve_server_with(Some("dc01.example.com"), env).unwrap();
        assert_eq!(found.server, "dc01.example.com");
        assert_eq!(found.suggested_base_dn, None);
    }

    #[test]
    fn test_logon_server_stripped() {
        let env = env_of(&[("LOGONSERVER", "\\\\DC02"), ("USERDNSDOMAIN", "EXAMPLE.COM")]);
        let found = resolve_server_with(None, env).unwrap();
        assert_eq!(found.server, "DC02");
        assert_eq!(found.suggested_base_dn.as_deref(), Some("DC=example,DC=com"));
    }

    #[test]
    fn test_dns_domain_fallback() {
        let env = env_of(&[("USERDNSDOMAIN", "EXAMPLE.COM")]);
        let found = resolve_server_with(Some("  "), env).unwrap();
        assert_eq!(found.server, "example.com");
        assert_eq!(found.suggested_base_dn.as_deref(), Some("DC=example,DC=com"));
    }

    #[test]
    fn test_nothing_found() {
        let err = resolve_server_with(None, env_of(&[])).unwrap_err();
        assert!(matches!(err, WhoamiError::Discovery(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_domain_to_base_dn() {
        assert_eq!(
            domain_to_base_dn("corp.example.com"),
            "DC=corp,DC=example,DC=com"
        );
        assert_eq!(domain_to_base_dn("example.com."), "DC=example,DC=com");
        assert_eq!(domain_to_base_dn("local"), "DC=local");
    }
}

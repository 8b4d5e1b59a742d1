//! Run configuration
//!
//! Built once from the command line and passed by reference into the session
//! and the run. Nothing in the crate mutates it afterwards.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::secure_types::Credentials;

/// Default connection timeout (15 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default per-operation timeout (30 seconds)
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size for paged searches
pub const DEFAULT_PAGE_SIZE: i32 = 500;

/// How the session authenticates to the directory server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Kerberos when built with `gssapi`, else NTLM or a simple bind with the
    /// given credentials
    #[default]
    #[value(alias = "nego")]
    Negotiate,
    /// SASL GSSAPI with the current Kerberos ticket cache (`gssapi` feature)
    #[value(alias = "kerb")]
    Kerberos,
    /// SASL NTLM with explicit credentials (`ntlm` feature)
    Ntlm,
    /// LDAP simple bind with explicit credentials
    Simple,
    /// No bind at all
    Anonymous,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMethod::Negotiate => "negotiate",
            AuthMethod::Kerberos => "kerberos",
            AuthMethod::Ntlm => "ntlm",
            AuthMethod::Simple => "simple",
            AuthMethod::Anonymous => "anonymous",
        };
        f.write_str(name)
    }
}

/// Output selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// `domain\account`, or tables when user/group detail is requested
    #[default]
    Text,
    /// The whole report as JSON
    Json,
}

/// Everything one run needs to know, resolved before connecting.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// `host`, `host:port`, or an `ldap://` / `ldaps://` URL
    pub server: String,
    pub auth: AuthMethod,
    pub credentials: Option<Credentials>,
    /// Search base; the server's default naming context when unset
    pub base_dn: Option<String>,
    /// Search base used when the RootDSE names none
    pub fallback_base_dn: Option<String>,
    /// Look up and report the user record
    pub show_user: bool,
    /// Walk and report group membership
    pub show_groups: bool,
    /// Also collect the groups the primary group is nested in. Off by
    /// default: the primary group is reported but not expanded.
    pub expand_primary_group: bool,
    pub use_starttls: bool,
    pub tls_verify: bool,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub page_size: i32,
    pub output: OutputFormat,
}

impl RunConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            auth: AuthMethod::default(),
            credentials: None,
            base_dn: None,
            fallback_base_dn: None,
            show_user: false,
            show_groups: false,
            expand_primary_group: false,
            use_starttls: false,
            tls_verify: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            output: OutputFormat::default(),
        }
    }

    /// Whether the run needs anything beyond the who-am-I answer
    pub fn needs_directory_lookup(&self) -> bool {
        self.show_user || self.show_groups
    }

    /// True when the server string asks for LDAP over TLS
    pub fn use_ldaps(&self) -> bool {
        self.server.ends_with(":636") || self.server.starts_with("ldaps://")
    }

    /// The URL handed to ldap3
    pub fn ldap_url(&self) -> String {
        if self.server.starts_with("ldap://") || self.server.starts_with("ldaps://") {
            self.server.clone()
        } else if self.use_ldaps() {
            format!("ldaps://{}", self.server)
        } else {
            format!("ldap://{}", self.server)
        }
    }

    /// Host name without scheme or port, as Kerberos needs it for the
    /// service principal `ldap/<host>`
    pub fn server_host(&self) -> &str {
        let rest = self
            .server
            .strip_prefix("ldaps://")
            .or_else(|| self.server.strip_prefix("ldap://"))
            .unwrap_or(&self.server);
        let rest = rest.split('/').next().unwrap_or(rest);
        match rest.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => rest,
        }
    }
}

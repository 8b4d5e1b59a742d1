//! Error handling module
//!
//! Structured error types for a who-am-I run. Every failure aborts the run and
//! reaches the caller with its category intact; nothing is retried or
//! silently degraded into a partial result.

use thiserror::Error;

/// Main error type for directory identity lookups
#[derive(Error, Debug)]
pub enum WhoamiError {
    /// The who-am-I response did not have the `u:domain\account` shape
    #[error("Unexpected identity format: {0}")]
    Protocol(String),

    /// A security identifier could not be decoded under either layout
    #[error("Failed to decode security identifier: {0}")]
    Decode(String),

    /// A search result entry lacks an attribute the record requires
    #[error("Missing attribute '{attribute}' on {dn}")]
    MissingAttribute { dn: String, attribute: String },

    /// A lookup the run depends on returned no entry
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Search or extended operation failed on the server
    #[error("LDAP operation failed: {0}")]
    Directory(String),

    /// LDAP connection error
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Bind / authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// No server address available after discovery
    #[error("No LDAP server available: {0}")]
    Discovery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WhoamiError {
    pub fn missing_attribute(dn: &str, attribute: &str) -> Self {
        WhoamiError::MissingAttribute {
            dn: dn.to_string(),
            attribute: attribute.to_string(),
        }
    }

    /// True for failures of the transport rather than of a directory operation.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            WhoamiError::Connection(_) | WhoamiError::Auth(_) | WhoamiError::Timeout(_)
        )
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            WhoamiError::Discovery(_) => 3,
            WhoamiError::Config(_) => 2,
            e if e.is_connection_failure() => 10,
            _ => 1,
        }
    }
}

impl From<ldap3::LdapError> for WhoamiError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => {
                match result.rc {
                    // 7 = authMethodNotSupported, 8 = strongerAuthRequired
                    7 | 8 => WhoamiError::Auth(format!(
                        "Server requires a different authentication method: {}",
                        result.text
                    )),
                    // 49 = Invalid credentials
                    49 => WhoamiError::Auth(format!("Invalid credentials: {}", result.text)),
                    // 32 = No such object
                    32 => WhoamiError::NotFound(format!("Object not found: {}", result.text)),
                    // 51 = Busy
                    51 => WhoamiError::Timeout(format!("Server is busy: {}", result.text)),
                    // 52 = Unavailable
                    52 => WhoamiError::Connection(format!(
                        "Server unavailable: {}",
                        result.text
                    )),
                    _ => WhoamiError::Directory(format!(
                        "LDAP error code {}: {}",
                        result.rc, result.text
                    )),
                }
            }
            ldap3::LdapError::EndOfStream => {
                WhoamiError::Connection("Connection closed unexpectedly".to_string())
            }
            ldap3::LdapError::Io { source } => {
                WhoamiError::Connection(format!("I/O error: {}", source))
            }
            ldap3::LdapError::Timeout { elapsed: _ } => {
                WhoamiError::Timeout("LDAP operation timed out".to_string())
            }
            _ => WhoamiError::Directory(format!("LDAP error: {}", err)),
        }
    }
}

impl From<std::io::Error> for WhoamiError {
    fn from(err: std::io::Error) -> Self {
        WhoamiError::Connection(format!("I/O error: {}", err))
    }
}

/// Result type alias for who-am-I operations
pub type Result<T> = std::result::Result<T, WhoamiError>;

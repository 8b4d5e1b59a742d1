//! Identity resolution from the who-am-I extended operation (RFC 4532).
//!
//! Active Directory answers with an authorization identity of the form
//! `u:DOMAIN\account`.

use serde::Serialize;
use std::fmt;

use crate::errors::{Result, WhoamiError};

/// The account the directory believes the connection is bound as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// NetBIOS domain name, lower-cased like the built-in `whoami` prints it
    pub domain: String,
    /// sAMAccountName, verbatim
    pub account_name: String,
}

impl Identity {
    /// Parses a who-am-I authorization identity.
    pub fn resolve(response: &str) -> Result<Self> {
        let unexpected = || WhoamiError::Protocol(response.to_string());

        let rest = response.strip_prefix("u:").ok_or_else(unexpected)?;
        let (domain, account_name) = rest.split_once('\\').ok_or_else(unexpected)?;
        if domain.is_empty() || account_name.is_empty() {
            return Err(unexpected());
        }

        Ok(Self {
            domain: domain.to_lowercase(),
            account_name: account_name.to_string(),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.domain, self.account_name)
    }
}

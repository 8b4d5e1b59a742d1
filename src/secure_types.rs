//! Bind credentials that are wiped from memory when dropped.
//!
//! Only explicit binds (simple, NTLM) need a password; Kerberos uses the
//! ticket cache of the current logon and never sees one.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A password that zeros its bytes on drop and never prints itself.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: Vec<u8>,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self {
            inner: s.into_bytes(),
        }
    }

    /// Temporarily exposes the secret. Use immediately, do not store.
    pub fn expose_secret(&self) -> &str {
        // Only ever built from a String, so always valid UTF-8
        std::str::from_utf8(&self.inner).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

/// Name and password for an explicit bind.
///
/// The name is passed to the server as given: a DN or UPN for simple binds,
/// `DOMAIN\user` or a bare account name for NTLM.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    bind_name: String,
    password: SecureString,
}

impl Credentials {
    pub fn new(bind_name: String, password: String) -> Self {
        Self {
            bind_name,
            password: SecureString::new(password),
        }
    }

    pub fn bind_name(&self) -> &str {
        &self.bind_name
    }

    /// Use this only to hand the password to a bind call.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.bind_name.is_empty() || self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bind_name", &self.bind_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

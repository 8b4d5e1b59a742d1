//! Reports the identity a connection is bound as on an LDAP directory
//! server, and optionally the complete, de-duplicated group membership of
//! that identity: direct, nested and primary group.

pub mod aggregate;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod errors;
pub mod identity;
pub mod ldap_helpers;
pub mod ldap_utils;
pub mod output;
pub mod record;
pub mod secure_types;
pub mod session;
pub mod sid;
pub mod walker;
pub mod whoami;

pub use directory::DirectorySession;
pub use errors::{Result, WhoamiError};
pub use whoami::{run, WhoamiReport};

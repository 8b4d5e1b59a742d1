//! Security identifier codec
//!
//! Decodes `objectSid` values into [`SecurityIdentifier`] and renders them in
//! the canonical `S-1-5-21-...` form used for display and filter building.
//!
//! Some directory responses hand `objectSid` back as text rather than binary.
//! Which representation a value is in is decided by [`classify`] alone.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::errors::{Result, WhoamiError};

/// Revision every SID issued by Windows carries
const SID_REVISION: u8 = 1;

/// SID_MAX_SUB_AUTHORITIES (MS-DTYP 2.4.2)
const MAX_SUB_AUTHORITIES: usize = 15;

/// Identifier authorities are 48-bit values
const MAX_AUTHORITY: u64 = (1 << 48) - 1;

/// SECURITY_NT_AUTHORITY
const NT_AUTHORITY: u64 = 5;

/// SECURITY_NT_NON_UNIQUE, first sub-authority of every domain account SID
const NT_NON_UNIQUE: u32 = 21;

/// A decoded security identifier.
///
/// # Format (MS-DTYP 2.4.2):
/// ```text
/// Offset  Size  Field
/// 0       1     Revision
/// 1       1     SubAuthorityCount
/// 2       6     IdentifierAuthority (big-endian)
/// 8       4*N   SubAuthorities (little-endian)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
///
/// Every value holds at most 15 sub-authorities and a 48-bit authority, so
/// it always has a binary encoding.
pub struct SecurityIdentifier {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

/// How an `objectSid` value arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SidRepresentation<'a> {
    /// Native binary layout
    Binary(&'a [u8]),
    /// Canonical `S-...` text
    Canonical(&'a str),
}

/// Decides how to read a possibly string-encoded SID value.
///
/// Bytes that form a well-shaped binary SID are read as binary even if they
/// happen to be printable. Bytes that are not, but spell out `S-...`, are read
/// as canonical text. Everything else is handed to the binary decoder, which
/// reports why it is undecodable.
pub(crate) fn classify(raw: &[u8]) -> SidRepresentation<'_> {
    if is_plausible_binary(raw) {
        return SidRepresentation::Binary(raw);
    }
    match std::str::from_utf8(raw) {
        Ok(text) if text.starts_with("S-") || text.starts_with("s-") => {
            SidRepresentation::Canonical(text)
        }
        _ => SidRepresentation::Binary(raw),
    }
}

fn check_sub_authority_count(count: usize) -> Result<()> {
    if count > MAX_SUB_AUTHORITIES {
        return Err(WhoamiError::Decode(format!(
            "{} sub-authorities, at most {} allowed",
            count, MAX_SUB_AUTHORITIES
        )));
    }
    Ok(())
}

fn is_plausible_binary(raw: &[u8]) -> bool {
    if raw.len() < 8 || raw[0] != SID_REVISION {
        return false;
    }
    let count = raw[1] as usize;
    count <= MAX_SUB_AUTHORITIES && raw.len() == 8 + count * 4
}

impl SecurityIdentifier {
    pub fn new(revision: u8, authority: u64, sub_authorities: Vec<u32>) -> Result<Self> {
        if authority > MAX_AUTHORITY {
            return Err(WhoamiError::Decode(format!(
                "authority {:#x} exceeds 48 bits",
                authority
            )));
        }
        check_sub_authority_count(sub_authorities.len())?;
        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn authority(&self) -> u64 {
        self.authority
    }

    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// Decodes the native binary layout. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(WhoamiError::Decode(format!(
                "SID too short ({} bytes, minimum 8)",
                bytes.len()
            )));
        }

        let revision = bytes[0];
        let sub_auth_count = bytes[1] as usize;
        check_sub_authority_count(sub_auth_count)?;

        if bytes.len() < 8 + sub_auth_count * 4 {
            return Err(WhoamiError::Decode(format!(
                "SID data insufficient for {} sub-authorities ({} bytes)",
                sub_auth_count,
                bytes.len()
            )));
        }

        let authority = u64::from_be_bytes([
            0, 0, bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);

        let sub_authorities = bytes[8..8 + sub_auth_count * 4]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// Decodes a value that may be either the binary layout or the same bytes
    /// delivered through a textual attribute.
    pub fn decode_quirky(raw: &[u8]) -> Result<Self> {
        match classify(raw) {
            SidRepresentation::Binary(bytes) => Self::decode(bytes),
            SidRepresentation::Canonical(text) => {
                warn!("objectSid arrived in canonical text form: {}", text);
                text.parse()
            }
        }
    }

    /// Encodes into the native binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.sub_authorities.len() * 4);
        bytes.push(self.revision);
        // at most MAX_SUB_AUTHORITIES, checked on construction
        bytes.push(self.sub_authorities.len() as u8);
        bytes.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub in &self.sub_authorities {
            bytes.extend_from_slice(&sub.to_le_bytes());
        }
        bytes
    }

    /// The relative identifier, i.e. the last sub-authority.
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }

    /// The SID of the domain that issued this account SID
    /// (`S-1-5-21-a-b-c-rid` → `S-1-5-21-a-b-c`).
    ///
    /// `None` for SIDs outside the NT non-unique space, such as well-known SIDs.
    pub fn account_domain(&self) -> Option<SecurityIdentifier> {
        if self.authority != NT_AUTHORITY
            || self.sub_authorities.len() < 4
            || self.sub_authorities[0] != NT_NON_UNIQUE
        {
            return None;
        }
        Some(Self {
            revision: self.revision,
            authority: self.authority,
            sub_authorities: self.sub_authorities[..4].to_vec(),
        })
    }

    /// Appends a relative identifier.
    pub fn with_rid(&self, rid: u32) -> Result<SecurityIdentifier> {
        let mut sub_authorities = self.sub_authorities.clone();
        sub_authorities.push(rid);
        Self::new(self.revision, self.authority, sub_authorities)
    }
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Authorities that do not fit in 32 bits are written in hex
        if self.authority > u64::from(u32::MAX) {
            write!(f, "S-{}-0x{:012X}", self.revision, self.authority)?;
        } else {
            write!(f, "S-{}-{}", self.revision, self.authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

impl FromStr for SecurityIdentifier {
    type Err = WhoamiError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| WhoamiError::Decode(format!("'{}' is not a SID: {}", s, why));

        let mut parts = s.split('-');
        match parts.next() {
            Some(p) if p.eq_ignore_ascii_case("S") => {}
            _ => return Err(invalid("missing 'S' prefix")),
        }

        let revision = parts
            .next()
            .and_then(|p| p.parse::<u8>().ok())
            .ok_or_else(|| invalid("bad revision"))?;

        let authority_text = parts.next().ok_or_else(|| invalid("missing authority"))?;
        let authority = match authority_text
            .strip_prefix("0x")
            .or_else(|| authority_text.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => authority_text.parse::<u64>(),
        }
        .map_err(|_| invalid("bad authority"))?;
        if authority > MAX_AUTHORITY {
            return Err(invalid("authority exceeds 48 bits"));
        }

        let sub_authorities = parts
            .map(|p| p.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid("bad sub-authority"))?;
        check_sub_authority_count(sub_authorities.len())?;

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }
}

impl Serialize for SecurityIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

//! Remote-issued identities.
//!
//! The remote source assigns every session an opaque, globally unique
//! identity on successful connect. Identities are stable for the lifetime of
//! a session and hex-encodable for display and map keying.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of a remote identity in bytes.
pub const IDENTITY_SIZE: usize = 32;

/// Length of the short hex prefix used for display fallback.
pub const SHORT_HEX_LEN: usize = 8;

/// Opaque identifier issued by the remote source.
///
/// Immutable once assigned for a session. Ordering is lexicographic over the
/// raw bytes, which gives derived views a deterministic tiebreaker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteIdentity([u8; IDENTITY_SIZE]);

impl RemoteIdentity {
    /// Create an identity from raw bytes.
    pub const fn from_bytes(bytes: [u8; IDENTITY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw identity bytes.
    pub const fn as_bytes(&self) -> &[u8; IDENTITY_SIZE] {
        &self.0
    }

    /// Full lowercase hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Short hex prefix for display when no name is available.
    pub fn short_hex(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_HEX_LEN);
        hex
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteIdentity({})", self.short_hex())
    }
}

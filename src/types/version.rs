//! Four-part protocol and server versions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Four-part version number (`major.minor.build.revision`).
///
/// Shorter versions are zero-padded on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ProtocolVersion(pub [u8; 4]);

impl ProtocolVersion {
    pub const UNSET: ProtocolVersion = ProtocolVersion([0; 4]);

    pub fn new(major: u8, minor: u8, build: u8, revision: u8) -> Self {
        Self([major, minor, build, revision])
    }

    /// Build a version from up to four parts, zero-padding the rest.
    pub fn from_parts(parts: &[u8]) -> Self {
        let mut version = [0u8; 4];
        for (slot, part) in version.iter_mut().zip(parts) {
            *slot = *part;
        }
        Self(version)
    }

    pub fn major(&self) -> u8 {
        self.0[0]
    }

    pub fn minor(&self) -> u8 {
        self.0[1]
    }

    /// True when major and minor are both zero.
    pub fn is_unset(&self) -> bool {
        self.0[0] == 0 && self.0[1] == 0
    }

    /// Compare major/minor only.
    pub fn same_major_minor(&self, other: &ProtocolVersion) -> bool {
        self.0[..2] == other.0[..2]
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl From<[u8; 4]> for ProtocolVersion {
    fn from(parts: [u8; 4]) -> Self {
        Self(parts)
    }
}

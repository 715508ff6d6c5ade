//! Negotiated server description

use serde::{Deserialize, Serialize};

use super::ProtocolVersion;

/// What the client has learned about the server.
///
/// Starts out unset and is filled in by SERVERINFO and bitstream responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ServerDescription {
    /// Application name reported by the server
    pub application_name: Option<String>,
    /// Server software version
    pub server_version: ProtocolVersion,
    /// Stream version the server is currently using
    pub stream_version: ProtocolVersion,
    /// Stream version the client asked for
    pub requested_version: ProtocolVersion,
    /// Whether the server allows switching the bitstream version
    pub can_change_bitstream_version: bool,
}

impl ServerDescription {
    /// Whether a SERVERINFO reply has been seen.
    pub fn has_server_info(&self) -> bool {
        self.application_name.is_some() && self.server_version != ProtocolVersion::UNSET
    }
}

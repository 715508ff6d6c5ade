//! Client connection settings
//!
//! [`ClientSettings`] is the single configuration value a [`NatNetClient`]
//! is built from. It can be assembled in code or loaded from YAML:
//!
//! ```yaml
//! server_address: 192.168.1.20
//! local_address: 192.168.1.31
//! use_multicast: false
//! requested_version: [4, 1, 0, 0]
//! ```
//!
//! Omitted fields take the defaults of a Motive server on the local host.
//! Once the client starts it locks its settings; every setter after that
//! returns [`MocapError::SettingsLocked`].
//!
//! [`NatNetClient`]: crate::NatNetClient

use crate::types::ProtocolVersion;
use crate::{MocapError, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;

pub const DEFAULT_MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 99);
pub const DEFAULT_COMMAND_PORT: u16 = 1510;
pub const DEFAULT_DATA_PORT: u16 = 1511;

/// Addresses, ports and mode for one server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    server_address: Ipv4Addr,
    local_address: Ipv4Addr,
    multicast_address: Ipv4Addr,
    command_port: u16,
    data_port: u16,
    use_multicast: bool,
    /// `0.0` means adopt whatever the server reports.
    requested_version: ProtocolVersion,
    #[serde(skip)]
    locked: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_address: Ipv4Addr::LOCALHOST,
            local_address: Ipv4Addr::LOCALHOST,
            multicast_address: DEFAULT_MULTICAST_ADDRESS,
            command_port: DEFAULT_COMMAND_PORT,
            data_port: DEFAULT_DATA_PORT,
            use_multicast: true,
            requested_version: ProtocolVersion::UNSET,
            locked: false,
        }
    }
}

impl ClientSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| MocapError::Parse {
            context: "Client settings YAML".to_string(),
            details: e.to_string(),
        })
    }

    /// Load settings from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| MocapError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn server_address(&self) -> Ipv4Addr {
        self.server_address
    }

    pub fn local_address(&self) -> Ipv4Addr {
        self.local_address
    }

    pub fn multicast_address(&self) -> Ipv4Addr {
        self.multicast_address
    }

    pub fn command_port(&self) -> u16 {
        self.command_port
    }

    pub fn data_port(&self) -> u16 {
        self.data_port
    }

    pub fn use_multicast(&self) -> bool {
        self.use_multicast
    }

    pub fn requested_version(&self) -> ProtocolVersion {
        self.requested_version
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Where commands are sent.
    pub fn command_endpoint(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.server_address, self.command_port))
    }

    pub fn set_server_address(&mut self, address: Ipv4Addr) -> Result<()> {
        self.ensure_unlocked("server_address")?;
        self.server_address = address;
        Ok(())
    }

    pub fn set_local_address(&mut self, address: Ipv4Addr) -> Result<()> {
        self.ensure_unlocked("local_address")?;
        self.local_address = address;
        Ok(())
    }

    pub fn set_multicast_address(&mut self, address: Ipv4Addr) -> Result<()> {
        self.ensure_unlocked("multicast_address")?;
        self.multicast_address = address;
        Ok(())
    }

    pub fn set_command_port(&mut self, port: u16) -> Result<()> {
        self.ensure_unlocked("command_port")?;
        self.command_port = port;
        Ok(())
    }

    pub fn set_data_port(&mut self, port: u16) -> Result<()> {
        self.ensure_unlocked("data_port")?;
        self.data_port = port;
        Ok(())
    }

    pub fn set_use_multicast(&mut self, use_multicast: bool) -> Result<()> {
        self.ensure_unlocked("use_multicast")?;
        self.use_multicast = use_multicast;
        Ok(())
    }

    /// Stream version to request; shorter inputs are zero-padded.
    pub fn set_requested_version(&mut self, parts: &[u8]) -> Result<()> {
        self.ensure_unlocked("requested_version")?;
        self.requested_version = ProtocolVersion::from_parts(parts);
        Ok(())
    }

    /// Freeze the settings. Irreversible.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    fn ensure_unlocked(&self, field: &str) -> Result<()> {
        if self.locked { Err(MocapError::settings_locked(field)) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_motive_in_multicast() {
        let settings = ClientSettings::default();
        assert_eq!(settings.server_address(), Ipv4Addr::LOCALHOST);
        assert_eq!(settings.multicast_address(), Ipv4Addr::new(239, 255, 42, 99));
        assert_eq!(settings.command_port(), 1510);
        assert_eq!(settings.data_port(), 1511);
        assert!(settings.use_multicast());
        assert!(settings.requested_version().is_unset());
        assert_eq!(settings.command_endpoint().to_string(), "127.0.0.1:1510");
    }

    #[test]
    fn setters_reject_writes_after_lock() {
        let mut settings = ClientSettings::new();
        settings.set_command_port(2510).unwrap();
        settings.set_requested_version(&[3, 1]).unwrap();
        assert_eq!(settings.requested_version(), ProtocolVersion::new(3, 1, 0, 0));

        settings.lock();
        let err = settings.set_command_port(3510).unwrap_err();
        assert!(matches!(err, MocapError::SettingsLocked { ref field } if field == "command_port"));
        assert!(settings.set_use_multicast(false).is_err());
        assert_eq!(settings.command_port(), 2510);
        assert!(settings.use_multicast());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let settings = ClientSettings::from_yaml_str(
            "server_address: 10.0.0.5\nuse_multicast: false\nrequested_version: [4, 0, 0, 0]\n",
        )
        .unwrap();
        assert_eq!(settings.server_address(), Ipv4Addr::new(10, 0, 0, 5));
        assert!(!settings.use_multicast());
        assert_eq!(settings.data_port(), 1511);
        assert_eq!(settings.requested_version().major(), 4);
        assert!(!settings.is_locked());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = ClientSettings::from_yaml_str("command_port: not-a-port").unwrap_err();
        assert!(matches!(err, MocapError::Parse { .. }));
    }

    #[test]
    fn yaml_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(&path, "local_address: 192.168.1.31\n").unwrap();
        let settings = ClientSettings::from_yaml_file(&path).unwrap();
        assert_eq!(settings.local_address(), Ipv4Addr::new(192, 168, 1, 31));

        let missing = ClientSettings::from_yaml_file(dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(MocapError::File { .. })));
    }
}

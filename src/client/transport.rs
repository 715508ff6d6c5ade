//! Socket setup and the retrying send path

use crate::settings::ClientSettings;
use crate::{MocapError, Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Attempts made for each command before giving up.
pub const COMMAND_ATTEMPTS: u32 = 3;

/// Anything that can push a datagram at an address.
///
/// Implemented for [`UdpSocket`]; tests substitute senders that fail on
/// demand.
#[async_trait]
pub trait DatagramSender: Send + Sync {
    async fn send_datagram(&self, packet: &[u8], target: SocketAddr) -> std::io::Result<usize>;
}

#[async_trait]
impl DatagramSender for UdpSocket {
    async fn send_datagram(&self, packet: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        self.send_to(packet, target).await
    }
}

/// Send `packet`, retrying up to [`COMMAND_ATTEMPTS`] times.
///
/// Returns the byte count of the first successful attempt, or a
/// [`MocapError::Command`] carrying the last failure.
pub async fn send_with_retry<S>(
    sender: &S,
    packet: &[u8],
    target: SocketAddr,
    command: &str,
) -> Result<usize>
where
    S: DatagramSender + ?Sized,
{
    let mut last_error = None;

    for attempt in 1..=COMMAND_ATTEMPTS {
        match sender.send_datagram(packet, target).await {
            Ok(sent) => {
                if attempt > 1 {
                    debug!("Command '{}' sent on attempt {}", command, attempt);
                }
                return Ok(sent);
            }
            Err(e) => {
                debug!("Command '{}' attempt {}/{} failed: {}", command, attempt, COMMAND_ATTEMPTS, e);
                last_error = Some(e);
            }
        }
    }

    let source = last_error.unwrap_or_else(|| std::io::Error::other("no send attempted"));
    warn!("Command '{}' failed after {} attempts: {}", command, COMMAND_ATTEMPTS, source);
    Err(MocapError::Command { command: command.to_string(), attempts: COMMAND_ATTEMPTS, source })
}

/// Bind a non-blocking UDP socket with `SO_REUSEADDR` set, so several
/// listeners on one host can share a port.
pub fn bind_reusable(address: SocketAddrV4, operation: &str) -> Result<UdpSocket> {
    let setup = || -> std::io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddr::V4(address).into())?;
        UdpSocket::from_std(socket.into())
    };
    setup().map_err(|e| MocapError::transport(operation, e))
}

/// Bind the command socket.
///
/// Multicast mode binds any interface with broadcast enabled; unicast binds
/// an ephemeral port on the configured local address.
pub fn bind_command_socket(settings: &ClientSettings) -> Result<UdpSocket> {
    if settings.use_multicast() {
        let socket =
            bind_reusable(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0), "bind command socket")?;
        socket.set_broadcast(true).map_err(|e| MocapError::transport("enable broadcast", e))?;
        Ok(socket)
    } else {
        bind_reusable(SocketAddrV4::new(settings.local_address(), 0), "bind command socket")
    }
}

/// Bind the data socket.
///
/// Multicast mode listens on the data port and joins the group on the local
/// interface. Unicast frames arrive on the command socket, so the data socket
/// only needs an ephemeral port.
pub fn bind_data_socket(settings: &ClientSettings) -> Result<UdpSocket> {
    if settings.use_multicast() {
        let socket = bind_reusable(
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, settings.data_port()),
            "bind data socket",
        )?;
        socket
            .join_multicast_v4(settings.multicast_address(), settings.local_address())
            .map_err(|e| MocapError::transport("join multicast group", e))?;
        info!(
            "Joined multicast group {} on {} (port {})",
            settings.multicast_address(),
            settings.local_address(),
            settings.data_port()
        );
        Ok(socket)
    } else {
        bind_reusable(SocketAddrV4::new(settings.local_address(), 0), "bind data socket")
    }
}

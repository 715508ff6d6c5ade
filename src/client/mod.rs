//! NatNet protocol client
//!
//! [`NatNetClient`] owns the command and data sockets, runs one receive task
//! per socket, and hands decoded payloads to the registered [`Listeners`].
//!
//! ## Lifecycle
//!
//! `Idle → Starting → Running → Stopped`. [`NatNetClient::start`] binds both
//! sockets, locks the settings, spawns the receive tasks and sends CONNECT
//! followed by REQUEST_FRAMEOFDATA. If either socket cannot be bound the
//! client stays `Idle`. [`NatNetClient::shutdown`] cancels both tasks and
//! waits a bounded time for them to finish.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mocapflow::{ClientSettings, Listeners, NatNetClient};
//!
//! # async fn example() -> mocapflow::Result<()> {
//! let mut settings = ClientSettings::new();
//! settings.set_use_multicast(false)?;
//!
//! let listeners = Listeners::new()
//!     .on_marker_set(|set| println!("{} @ {}: {} markers", set.label, set.frame_number, set.len()));
//!
//! let mut client = NatNetClient::new(settings, listeners);
//! client.start().await?;
//! client.send_command("TimelinePlay").await?;
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod receiver;
mod transport;


pub use receiver::COMMAND_RECV_TIMEOUT;
pub use transport::{
    COMMAND_ATTEMPTS, DatagramSender, bind_command_socket, bind_data_socket, bind_reusable,
    send_with_retry,
};

use crate::listeners::Listeners;
use crate::natnet::format::encode_request;
use crate::settings::ClientSettings;
use crate::types::{MessageId, ProtocolVersion, ServerDescription};
use crate::{MocapError, Result};
use receiver::{Dispatcher, run_command_loop, run_data_loop};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on how long shutdown waits for the receive tasks.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands sent after a bitstream change to make the server resend frames.
const PLAYBACK_RESET: [&str; 4] =
    ["TimelinePlay", "TimelineStop", "SetPlaybackCurrentFrame,0", "TimelineStop"];

/// Client lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ClientState {
    Idle,
    Starting,
    Running,
    Stopped,
}

/// Delays used around a bitstream change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChangeTimings {
    /// Between the first TimelinePlay and the reset batch
    pub reset_pause: Duration,
    /// After the reset batch
    pub settle: Duration,
    /// After a configuration refresh
    pub refresh: Duration,
}

impl Default for ChangeTimings {
    fn default() -> Self {
        Self {
            reset_pause: Duration::from_millis(100),
            settle: Duration::from_secs(2),
            refresh: Duration::from_millis(500),
        }
    }
}

/// Sockets and tasks that exist only while running.
struct Session {
    command_socket: Arc<UdpSocket>,
    cancel: CancellationToken,
    data_task: JoinHandle<()>,
    command_task: JoinHandle<()>,
}

/// NatNet client.
pub struct NatNetClient {
    settings: ClientSettings,
    listeners: Listeners,
    state: ClientState,
    description: Arc<watch::Sender<ServerDescription>>,
    session: Option<Session>,
    pub(crate) timings: ChangeTimings,
}

impl NatNetClient {
    pub fn new(settings: ClientSettings, listeners: Listeners) -> Self {
        let description = ServerDescription {
            requested_version: settings.requested_version(),
            ..Default::default()
        };
        let (tx, _) = watch::channel(description);
        Self {
            settings,
            listeners,
            state: ClientState::Idle,
            description: Arc::new(tx),
            session: None,
            timings: ChangeTimings::default(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Mutable settings; every setter fails once the client has started.
    pub fn settings_mut(&mut self) -> &mut ClientSettings {
        &mut self.settings
    }

    /// Open both channels and begin receiving.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ClientState::Idle {
            return Err(MocapError::configuration(format!(
                "Client cannot start from state {:?}",
                self.state
            )));
        }
        if !self.listeners.has_marker_set_listener() {
            return Err(MocapError::configuration(
                "A marker-set listener must be registered before starting",
            ));
        }

        self.state = ClientState::Starting;
        let mode = if self.settings.use_multicast() { "multicast" } else { "unicast" };
        info!("Starting NatNet client ({}) for {}", mode, self.settings.command_endpoint());

        let data_socket = match bind_data_socket(&self.settings) {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Could not open data channel: {}", e);
                self.state = ClientState::Idle;
                return Err(e);
            }
        };
        let command_socket = match bind_command_socket(&self.settings) {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                warn!("Could not open command channel: {}", e);
                self.state = ClientState::Idle;
                return Err(e);
            }
        };

        self.settings.lock();
        let requested = self.settings.requested_version();
        self.description.send_if_modified(|d| {
            let changed = d.requested_version != requested;
            d.requested_version = requested;
            changed
        });

        let dispatcher = Arc::new(Dispatcher::new(
            self.listeners.clone(),
            Arc::clone(&self.description),
            self.settings.use_multicast(),
        ));
        let cancel = CancellationToken::new();
        let keep_alive = (!self.settings.use_multicast()).then(|| self.settings.command_endpoint());

        let data_task =
            tokio::spawn(run_data_loop(data_socket, Arc::clone(&dispatcher), cancel.clone()));
        let command_task = tokio::spawn(run_command_loop(
            Arc::clone(&command_socket),
            dispatcher,
            cancel.clone(),
            keep_alive,
        ));

        self.session = Some(Session { command_socket, cancel, data_task, command_task });
        self.state = ClientState::Running;

        if let Err(e) = self.send_request(MessageId::Connect, "").await {
            warn!("CONNECT request failed: {}", e);
        }
        if let Err(e) = self.send_request(MessageId::RequestFrameOfData, "").await {
            warn!("REQUEST_FRAMEOFDATA failed: {}", e);
        }

        Ok(())
    }

    /// Stop both receive tasks and release the sockets.
    ///
    /// Returns [`MocapError::Timeout`] if the tasks had to be aborted.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            if self.state == ClientState::Running {
                self.state = ClientState::Stopped;
            }
            return Ok(());
        };

        info!("Shutting down NatNet client");
        let Session { command_socket, cancel, mut data_task, mut command_task } = session;
        cancel.cancel();
        drop(command_socket);

        let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            let _ = (&mut data_task).await;
            let _ = (&mut command_task).await;
        })
        .await;

        self.state = ClientState::Stopped;
        match joined {
            Ok(()) => {
                debug!("Receive tasks joined");
                Ok(())
            }
            Err(_) => {
                warn!("Receive tasks did not stop within {:?}, aborting", SHUTDOWN_TIMEOUT);
                data_task.abort();
                command_task.abort();
                Err(MocapError::Timeout { duration: SHUTDOWN_TIMEOUT })
            }
        }
    }

    fn command_socket(&self) -> Result<&Arc<UdpSocket>> {
        self.session
            .as_ref()
            .map(|s| &s.command_socket)
            .ok_or_else(|| MocapError::configuration("Client is not running"))
    }

    /// Send one request on the command socket without retrying.
    pub async fn send_request(&self, message_id: MessageId, command: &str) -> Result<usize> {
        let socket = self.command_socket()?;
        let packet = encode_request(message_id, command);
        debug!("Sending {:?} ({} bytes)", message_id, packet.len());
        socket
            .send_to(&packet, self.settings.command_endpoint())
            .await
            .map_err(|e| MocapError::transport(format!("send {:?}", message_id), e))
    }

    /// Send a text command, retrying up to [`COMMAND_ATTEMPTS`] times.
    pub async fn send_command(&self, command: &str) -> Result<usize> {
        let socket = self.command_socket()?;
        let packet = encode_request(MessageId::Request, command);
        send_with_retry(&**socket, &packet, self.settings.command_endpoint(), command).await
    }

    /// Send commands back to back without waiting for responses.
    pub async fn send_commands(&self, commands: &[&str], log_results: bool) {
        for command in commands {
            let result = self.send_command(command).await;
            if log_results {
                match result {
                    Ok(sent) => info!("Command: {} - sent {} bytes", command, sent),
                    Err(e) => warn!("Command: {} - {}", command, e),
                }
            }
        }
    }

    pub async fn send_keep_alive(&self) -> Result<usize> {
        self.send_request(MessageId::KeepAlive, "").await
    }

    /// Ask the server for its current bitstream version.
    pub async fn refresh_configuration(&self) -> Result<()> {
        self.send_command("Bitstream").await?;
        tokio::time::sleep(self.timings.refresh).await;
        Ok(())
    }

    /// Switch the server to another bitstream version.
    ///
    /// Requires a unicast connection to a server speaking stream version 4 or
    /// later. Asking for the version already requested fails with
    /// [`MocapError::Domain`] and sends nothing. On success
    /// the playback reset sequence is sent and the new version recorded; if
    /// the change command cannot be sent the requested version is unchanged.
    pub async fn set_bitstream_version(&self, major: u8, minor: u8) -> Result<()> {
        let requested = ProtocolVersion::new(major, minor, 0, 0);
        let current = self.description.borrow().clone();

        if !current.can_change_bitstream_version {
            return Err(MocapError::configuration(format!(
                "Server does not allow changing the bitstream version to {}.{}",
                major, minor
            )));
        }
        if current.requested_version.same_major_minor(&requested) {
            return Err(MocapError::domain(format!(
                "Bitstream version {}.{} is already requested",
                major, minor
            )));
        }

        self.send_command(&format!("Bitstream {}.{}", major, minor)).await?;
        info!("Changing bitstream version {} -> {}", current.requested_version, requested);

        if let Err(e) = self.send_command("TimelinePlay").await {
            warn!("Playback reset failed: {}", e);
        }
        tokio::time::sleep(self.timings.reset_pause).await;
        self.send_commands(&PLAYBACK_RESET, false).await;
        tokio::time::sleep(self.timings.settle).await;

        self.description.send_modify(|d| d.requested_version = requested);
        Ok(())
    }

    /// Both channels open and the server has identified itself.
    pub fn is_connected(&self) -> bool {
        self.session.is_some() && self.description.borrow().has_server_info()
    }

    /// Snapshot of what is known about the server.
    pub fn server_description(&self) -> ServerDescription {
        self.description.borrow().clone()
    }

    /// Watch server description updates.
    pub fn subscribe(&self) -> watch::Receiver<ServerDescription> {
        self.description.subscribe()
    }

    pub fn application_name(&self) -> Option<String> {
        self.description.borrow().application_name.clone()
    }

    pub fn server_version(&self) -> ProtocolVersion {
        self.description.borrow().server_version
    }

    /// Stream version the server last reported.
    pub fn nat_net_version_server(&self) -> ProtocolVersion {
        self.description.borrow().stream_version
    }

    pub fn nat_net_requested_version(&self) -> ProtocolVersion {
        self.description.borrow().requested_version
    }

    pub fn can_change_bitstream_version(&self) -> bool {
        self.description.borrow().can_change_bitstream_version
    }

    pub fn command_port(&self) -> u16 {
        self.settings.command_port()
    }

    pub fn server_address(&self) -> Ipv4Addr {
        self.settings.server_address()
    }

    pub fn client_address(&self) -> Ipv4Addr {
        self.settings.local_address()
    }

    /// Local address of the command socket while running.
    pub fn command_local_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().and_then(|s| s.command_socket.local_addr().ok())
    }
}

impl Drop for NatNetClient {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            debug!("Dropping running NatNet client");
            session.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for NatNetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatNetClient")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("listeners", &self.listeners)
            .field("description", &*self.description.borrow())
            .finish()
    }
}

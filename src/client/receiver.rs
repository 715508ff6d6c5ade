//! Receive loops and message dispatch

use crate::listeners::Listeners;
use crate::natnet::Response;
use crate::natnet::format::{
    self, RECV_BUFFER_SIZE, parse_bitstream_version, parse_envelope, parse_response,
    parse_server_info, parse_text, unpack_frame_of_data,
};
use crate::types::{MessageId, ServerDescription};
use crate::{MocapError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Receive timeout on the command channel.
pub const COMMAND_RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Decodes datagrams and hands the results to listeners.
///
/// Shared by both loops: in unicast mode frames arrive on the command socket.
pub(crate) struct Dispatcher {
    listeners: Listeners,
    description: Arc<watch::Sender<ServerDescription>>,
    use_multicast: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        listeners: Listeners,
        description: Arc<watch::Sender<ServerDescription>>,
        use_multicast: bool,
    ) -> Self {
        Self { listeners, description, use_multicast }
    }

    /// Handle one datagram. Errors describe a malformed or unknown message;
    /// the caller logs them and keeps receiving.
    pub(crate) fn dispatch(&self, datagram: &[u8]) -> Result<MessageId> {
        let envelope = parse_envelope(datagram)?;
        let Some(kind) = envelope.kind() else {
            return Err(MocapError::protocol(
                "message dispatch",
                format!(
                    "unrecognized message id {} ({} bytes)",
                    envelope.message_id, envelope.payload_size
                ),
            ));
        };

        match kind {
            MessageId::FrameOfData => {
                let frame = unpack_frame_of_data(envelope.payload)?;
                trace!("Frame {}: {} marker sets", frame.frame_number, frame.marker_sets.len());
                for set in &frame.marker_sets {
                    self.listeners.emit_marker_set(set);
                }
            }
            MessageId::ServerInfo => {
                let info = parse_server_info(envelope.payload)?;
                let use_multicast = self.use_multicast;
                self.description.send_modify(|d| {
                    d.application_name = Some(info.application_name.clone());
                    d.server_version = info.server_version;
                    d.stream_version = info.stream_version;
                    if d.requested_version.is_unset() {
                        debug!("Adopting server stream version {}", info.stream_version);
                        d.requested_version = info.stream_version;
                        d.can_change_bitstream_version =
                            info.stream_version.major() >= 4 && !use_multicast;
                    }
                });
                info!(
                    "Server info: {} {} (stream {})",
                    info.application_name, info.server_version, info.stream_version
                );
                let snapshot = self.description.borrow().clone();
                self.listeners.emit_server_info(&snapshot);
            }
            MessageId::Response => {
                let response = parse_response(envelope.payload)?;
                if let Response::Text(text) = &response {
                    if text.starts_with("Bitstream") {
                        match parse_bitstream_version(text) {
                            Some(version) => {
                                debug!("Server stream version is now {}", version);
                                self.description.send_modify(|d| d.stream_version = version);
                            }
                            None => warn!("Could not read version from '{}'", text),
                        }
                    }
                }
                debug!("Command response: {:?}", response);
                self.listeners.emit_response(&response);
            }
            MessageId::MessageString => {
                let message = parse_text(envelope.payload)?;
                debug!("Server message: {}", message);
                self.listeners.emit_message_string(&message);
            }
            MessageId::UnrecognizedRequest => {
                debug!("Server did not recognize a request ({} bytes)", envelope.payload_size);
            }
            other => {
                trace!("Ignoring {:?} ({} bytes)", other, envelope.payload_size);
            }
        }

        Ok(kind)
    }
}

fn handle(dispatcher: &Dispatcher, datagram: &[u8], channel: &str) {
    if datagram.is_empty() {
        return;
    }
    if let Err(e) = dispatcher.dispatch(datagram) {
        let id = format::peek_message_id(datagram).ok();
        warn!("Dropping {} message {:?}: {}", channel, id, e);
    }
}

/// Data channel: receive until cancelled or the socket fails.
pub(crate) async fn run_data_loop(
    socket: UdpSocket,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) {
    info!("Data receive loop started on {:?}", socket.local_addr().ok());
    let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
    let mut received = 0u64;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut buffer) => result,
        };

        match result {
            Ok((len, _)) => {
                received += 1;
                handle(&dispatcher, &buffer[..len], "data");
            }
            Err(e) => {
                if !cancel.is_cancelled() {
                    error!("Data socket receive failed: {}", e);
                }
                break;
            }
        }
    }

    info!("Data receive loop ended ({} datagrams)", received);
}

/// Command channel: receive with a timeout, keeping a unicast session alive.
///
/// When `keep_alive` is set a KEEPALIVE request is sent to that address after
/// every receive and every timeout. Without it (multicast) timeouts are
/// simply ignored.
pub(crate) async fn run_command_loop(
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    keep_alive: Option<SocketAddr>,
) {
    info!("Command receive loop started on {:?}", socket.local_addr().ok());
    let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
    let keep_alive_packet = format::encode_request(MessageId::KeepAlive, "");

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(
                COMMAND_RECV_TIMEOUT,
                socket.recv_from(&mut buffer),
            ) => result,
        };

        match result {
            Ok(Ok((len, _))) => handle(&dispatcher, &buffer[..len], "command"),
            Ok(Err(e)) => {
                if !cancel.is_cancelled() {
                    error!("Command socket receive failed: {}", e);
                }
                break;
            }
            Err(_) => trace!("Command socket idle for {:?}", COMMAND_RECV_TIMEOUT),
        }

        if let Some(server) = keep_alive {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = socket.send_to(&keep_alive_packet, server).await {
                debug!("Keep-alive to {} failed: {}", server, e);
            }
        }
    }

    info!("Command receive loop ended");
}

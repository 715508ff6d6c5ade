//! NatNet wire format
//!
//! Every datagram starts with a 4-byte envelope: `u16` message id and `u16`
//! payload size, both little-endian. The helpers here split that envelope off,
//! encode client requests, and turn the payloads the client cares about into
//! typed values.
//!
//! The `encode_*` server-side helpers mirror the parsers so that replay
//! tooling and loopback tests can produce well-formed traffic.

use super::decoder::StreamDecoder;
use crate::types::{FrameOfData, MarkerSample, MarkerSet, MessageId, ProtocolVersion};
use crate::{MocapError, Result};
use tracing::trace;

/// Envelope width (message id + payload size).
pub const HEADER_SIZE: usize = 4;

/// Receive buffer size used by both loops.
pub const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// SERVERINFO payload width: 256-byte name + two 4-byte versions.
pub const SERVER_INFO_SIZE: usize = 264;

const APPLICATION_NAME_SIZE: usize = 256;

/// CONNECT payload width: "Ping", zero padding, requested stream version.
pub const CONNECT_PAYLOAD_SIZE: usize = 268;

/// Stream version announced in the CONNECT payload.
pub const CONNECT_VERSION: ProtocolVersion = ProtocolVersion([4, 1, 0, 0]);

/// Envelope split off a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub message_id: u16,
    pub payload_size: u16,
    pub payload: &'a [u8],
}

impl Envelope<'_> {
    /// Known message id, if any.
    pub fn kind(&self) -> Option<MessageId> {
        MessageId::from_code(self.message_id)
    }
}

/// Reply to a REQUEST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// 4-byte numeric result code
    Code(u32),
    /// Null-terminated text reply
    Text(String),
}

/// Parsed SERVERINFO payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub application_name: String,
    pub server_version: ProtocolVersion,
    pub stream_version: ProtocolVersion,
}

/// Read the message id without validating the rest of the datagram.
pub fn peek_message_id(datagram: &[u8]) -> Result<u16> {
    match datagram {
        [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(MocapError::decode_short("message id", 0, 2, datagram.len())),
    }
}

/// Split a datagram into its envelope and declared payload.
pub fn parse_envelope(datagram: &[u8]) -> Result<Envelope<'_>> {
    if datagram.len() < HEADER_SIZE {
        return Err(MocapError::decode_short("envelope", 0, HEADER_SIZE, datagram.len()));
    }

    let message_id = u16::from_le_bytes([datagram[0], datagram[1]]);
    let payload_size = u16::from_le_bytes([datagram[2], datagram[3]]);
    let body = &datagram[HEADER_SIZE..];
    if body.len() < payload_size as usize {
        return Err(MocapError::decode_short(
            "payload",
            HEADER_SIZE,
            payload_size as usize,
            body.len(),
        ));
    }

    Ok(Envelope { message_id, payload_size, payload: &body[..payload_size as usize] })
}

/// Wrap a payload in an envelope.
pub fn encode_message(message_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&message_id.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Encode a client request.
///
/// Text requests carry the UTF-8 command plus a `0x00` terminator and declare
/// `len + 1` as their size. Payload-free requests (model definitions, single
/// frame, keep-alive) declare size 0 but still end with the terminator byte.
/// CONNECT ignores `command` and sends the fixed ping structure.
pub fn encode_request(message_id: MessageId, command: &str) -> Vec<u8> {
    let body: Vec<u8> = match message_id {
        MessageId::Connect => connect_payload().to_vec(),
        _ => command.as_bytes().to_vec(),
    };

    let declared = if message_id.is_empty_request() { 0 } else { body.len() + 1 };

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + 1);
    out.extend_from_slice(&message_id.code().to_le_bytes());
    out.extend_from_slice(&(declared as u16).to_le_bytes());
    out.extend_from_slice(&body);
    out.push(0);
    out
}

fn connect_payload() -> [u8; CONNECT_PAYLOAD_SIZE] {
    let mut payload = [0u8; CONNECT_PAYLOAD_SIZE];
    payload[..4].copy_from_slice(b"Ping");
    payload[CONNECT_PAYLOAD_SIZE - 4..].copy_from_slice(&CONNECT_VERSION.0);
    payload
}

/// Decode a FRAMEOFDATA payload.
///
/// Layout: frame number, marker-set count, a size field that is skipped, then
/// for each set a label, marker count and that many positions. The whole frame
/// is decoded before anything is returned, so a truncated payload yields an
/// error and no partial sets.
pub fn unpack_frame_of_data(payload: &[u8]) -> Result<FrameOfData> {
    let mut decoder = StreamDecoder::new(payload);
    let frame_number = decoder.frame_number()?;
    let set_count = decoder.count()?;
    let _ = decoder.size()?;

    let mut marker_sets = Vec::with_capacity(bounded_capacity(set_count, decoder.remaining(), 5));
    for _ in 0..set_count {
        let label = decoder.label()?;
        let marker_count = decoder.count()?;
        let capacity = bounded_capacity(marker_count, decoder.remaining(), MarkerSample::SIZE);
        let mut markers = Vec::with_capacity(capacity);
        for _ in 0..marker_count {
            markers.push(decoder.marker()?);
        }
        trace!(frame_number, label = %label, markers = markers.len(), "Decoded marker set");
        marker_sets.push(MarkerSet { label, frame_number, markers });
    }

    Ok(FrameOfData { frame_number, marker_sets })
}

// Never trust a declared count beyond what the buffer could hold.
fn bounded_capacity(declared: u32, remaining: usize, min_width: usize) -> usize {
    (declared as usize).min(remaining / min_width)
}

/// Encode a frame the way a server streams it.
pub fn encode_frame_of_data(frame: &FrameOfData) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&frame.frame_number.to_le_bytes());
    payload.extend_from_slice(&(frame.marker_sets.len() as u32).to_le_bytes());
    payload.extend_from_slice(&0u32.to_le_bytes());
    for set in &frame.marker_sets {
        payload.extend_from_slice(set.label.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&(set.markers.len() as u32).to_le_bytes());
        for marker in &set.markers {
            payload.extend_from_slice(&marker.pos_x.to_le_bytes());
            payload.extend_from_slice(&marker.pos_y.to_le_bytes());
            payload.extend_from_slice(&marker.pos_z.to_le_bytes());
        }
    }
    encode_message(MessageId::FrameOfData.code(), &payload)
}

/// Decode a SERVERINFO payload.
pub fn parse_server_info(payload: &[u8]) -> Result<ServerInfo> {
    if payload.len() < SERVER_INFO_SIZE {
        return Err(MocapError::decode_short("server info", 0, SERVER_INFO_SIZE, payload.len()));
    }

    let name = &payload[..APPLICATION_NAME_SIZE];
    let name_len = name.iter().position(|&b| b == 0).unwrap_or(APPLICATION_NAME_SIZE);
    let application_name = std::str::from_utf8(&name[..name_len])
        .map_err(|e| MocapError::protocol("server info application name", e.to_string()))?
        .to_string();

    let version_at = |at: usize| {
        ProtocolVersion([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
    };

    Ok(ServerInfo {
        application_name,
        server_version: version_at(APPLICATION_NAME_SIZE),
        stream_version: version_at(APPLICATION_NAME_SIZE + 4),
    })
}

/// Encode a SERVERINFO reply.
pub fn encode_server_info(info: &ServerInfo) -> Vec<u8> {
    let mut payload = vec![0u8; SERVER_INFO_SIZE];
    let name = info.application_name.as_bytes();
    let len = name.len().min(APPLICATION_NAME_SIZE - 1);
    payload[..len].copy_from_slice(&name[..len]);
    payload[APPLICATION_NAME_SIZE..APPLICATION_NAME_SIZE + 4]
        .copy_from_slice(&info.server_version.0);
    payload[APPLICATION_NAME_SIZE + 4..].copy_from_slice(&info.stream_version.0);
    encode_message(MessageId::ServerInfo.code(), &payload)
}

/// Decode a RESPONSE payload: exactly 4 bytes is a numeric code.
pub fn parse_response(payload: &[u8]) -> Result<Response> {
    if let [a, b, c, d] = payload {
        return Ok(Response::Code(u32::from_le_bytes([*a, *b, *c, *d])));
    }
    parse_text(payload).map(Response::Text)
}

/// Decode a null-terminated text payload (terminator optional).
pub fn parse_text(payload: &[u8]) -> Result<String> {
    let len = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    std::str::from_utf8(&payload[..len])
        .map(str::to_string)
        .map_err(|e| MocapError::protocol("text payload", e.to_string()))
}

/// Extract the stream version from a `Bitstream` reply.
///
/// Accepts `"Bitstream,4.1"` and `"Bitstream 4.1.0"`; anything else is
/// `None`. Missing parts are zero-padded.
pub fn parse_bitstream_version(text: &str) -> Option<ProtocolVersion> {
    let rest = text.strip_prefix("Bitstream")?;
    let rest = rest.strip_prefix([',', ' ']).unwrap_or(rest).trim();
    let version = rest.split([',', ' ']).next()?;
    if version.is_empty() {
        return None;
    }

    let parts = version.split('.').map(|p| p.trim().parse::<u8>()).collect::<Result<Vec<_>, _>>();
    match parts {
        Ok(parts) if parts.len() <= 4 => Some(ProtocolVersion::from_parts(&parts)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_frame() -> FrameOfData {
        FrameOfData {
            frame_number: 4521,
            marker_sets: vec![
                MarkerSet::new(
                    "hand",
                    4521,
                    vec![MarkerSample::new(0.1, 0.2, 0.3), MarkerSample::new(0.4, 0.5, 0.6)],
                ),
                MarkerSet::new("all", 4521, vec![MarkerSample::new(1.0, 2.0, 3.0); 3]),
            ],
        }
    }

    #[test]
    fn request_envelope_declares_text_length_plus_terminator() {
        let packet = encode_request(MessageId::Request, "TimelinePlay");
        assert_eq!(&packet[..2], &2u16.to_le_bytes());
        assert_eq!(&packet[2..4], &13u16.to_le_bytes());
        assert_eq!(&packet[4..16], b"TimelinePlay");
        assert_eq!(packet.last(), Some(&0));
        assert_eq!(packet.len(), HEADER_SIZE + 13);
    }

    #[test]
    fn empty_requests_declare_zero_size() {
        for id in [MessageId::KeepAlive, MessageId::RequestFrameOfData, MessageId::RequestModelDef] {
            let packet = encode_request(id, "");
            assert_eq!(packet, [id.code().to_le_bytes().as_slice(), &[0, 0, 0]].concat());
        }
    }

    #[test]
    fn connect_payload_is_fixed_ping_structure() {
        let packet = encode_request(MessageId::Connect, "ignored");
        let payload = &packet[HEADER_SIZE..HEADER_SIZE + CONNECT_PAYLOAD_SIZE];
        assert_eq!(&payload[..4], b"Ping");
        assert!(payload[4..264].iter().all(|&b| b == 0));
        assert_eq!(&payload[264..], &[4, 1, 0, 0]);
        assert_eq!(packet.len(), HEADER_SIZE + CONNECT_PAYLOAD_SIZE + 1);
    }

    #[test]
    fn envelope_rejects_truncated_payload() {
        let mut packet = encode_message(MessageId::MessageString.code(), b"hello\0");
        packet.truncate(packet.len() - 2);
        assert!(matches!(parse_envelope(&packet), Err(MocapError::Decode { .. })));
        assert!(peek_message_id(&[7]).is_err());
        assert_eq!(peek_message_id(&packet).unwrap(), 8);
    }

    #[test]
    fn frame_of_data_stamps_frame_number_on_every_set() {
        let frame = sample_frame();
        let packet = encode_frame_of_data(&frame);
        let envelope = parse_envelope(&packet).unwrap();
        assert_eq!(envelope.kind(), Some(MessageId::FrameOfData));

        let decoded = unpack_frame_of_data(envelope.payload).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.marker_count(), 5);
        assert!(decoded.marker_sets.iter().all(|s| s.frame_number == 4521));
    }

    #[test]
    fn truncated_frame_yields_no_sets() {
        let packet = encode_frame_of_data(&sample_frame());
        let payload = &packet[HEADER_SIZE..packet.len() - 3];
        assert!(matches!(unpack_frame_of_data(payload), Err(MocapError::Decode { .. })));
    }

    #[test]
    fn oversized_declared_count_does_not_allocate_blindly() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&u32::MAX.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes());
        assert!(unpack_frame_of_data(&payload).is_err());
    }

    #[test]
    fn server_info_round_trip() {
        let info = ServerInfo {
            application_name: "Motive".into(),
            server_version: ProtocolVersion::new(3, 1, 0, 0),
            stream_version: ProtocolVersion::new(4, 1, 0, 0),
        };
        let packet = encode_server_info(&info);
        let envelope = parse_envelope(&packet).unwrap();
        assert_eq!(envelope.payload.len(), SERVER_INFO_SIZE);
        assert_eq!(parse_server_info(envelope.payload).unwrap(), info);
        assert!(parse_server_info(&envelope.payload[..100]).is_err());
    }

    #[test]
    fn response_code_versus_text() {
        assert_eq!(parse_response(&7u32.to_le_bytes()).unwrap(), Response::Code(7));
        assert_eq!(
            parse_response(b"Bitstream,4.1\0").unwrap(),
            Response::Text("Bitstream,4.1".into())
        );
    }

    #[test]
    fn bitstream_versions_parse() {
        assert_eq!(parse_bitstream_version("Bitstream,4.1"), Some(ProtocolVersion::new(4, 1, 0, 0)));
        assert_eq!(parse_bitstream_version("Bitstream 3.1.2"), Some(ProtocolVersion::new(3, 1, 2, 0)));
        assert_eq!(parse_bitstream_version("Bitstream"), None);
        assert_eq!(parse_bitstream_version("Bitstream,x.y"), None);
        assert_eq!(parse_bitstream_version("TimelinePlay"), None);
    }

    proptest! {
        #[test]
        fn prop_frame_callbacks_match_set_layout(
            frame_number in any::<u32>(),
            sizes in prop::collection::vec(0usize..20, 0..8)
        ) {
            let frame = FrameOfData {
                frame_number,
                marker_sets: sizes
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| MarkerSet::new(format!("set{}", i), frame_number, vec![MarkerSample::new(i as f32, 0.5, -0.5); n]))
                    .collect(),
            };
            let packet = encode_frame_of_data(&frame);
            let decoded = unpack_frame_of_data(parse_envelope(&packet).unwrap().payload).unwrap();
            prop_assert_eq!(decoded.marker_sets.len(), sizes.len());
            prop_assert_eq!(decoded.marker_count(), sizes.iter().sum::<usize>());
            prop_assert!(decoded.marker_sets.iter().all(|s| s.frame_number == frame_number));
        }
    }
}

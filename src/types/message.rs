//! NatNet message identifiers

use serde::{Deserialize, Serialize};

/// Message ids carried in the first two bytes of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum MessageId {
    /// Client hello, answered with SERVERINFO
    Connect,
    /// Server name and versions
    ServerInfo,
    /// Text command from the client
    Request,
    /// Server reply to a request
    Response,
    /// Ask for model definitions
    RequestModelDef,
    /// Model definitions
    ModelDef,
    /// Ask for a single frame
    RequestFrameOfData,
    /// Motion-capture frame
    FrameOfData,
    /// Free-form server message
    MessageString,
    /// Client goodbye
    Disconnect,
    /// Unicast keep-alive
    KeepAlive,
    /// Server did not understand a request
    UnrecognizedRequest,
}

impl MessageId {
    /// Wire value of this message id.
    pub const fn code(&self) -> u16 {
        match self {
            MessageId::Connect => 0,
            MessageId::ServerInfo => 1,
            MessageId::Request => 2,
            MessageId::Response => 3,
            MessageId::RequestModelDef => 4,
            MessageId::ModelDef => 5,
            MessageId::RequestFrameOfData => 6,
            MessageId::FrameOfData => 7,
            MessageId::MessageString => 8,
            MessageId::Disconnect => 9,
            MessageId::KeepAlive => 10,
            MessageId::UnrecognizedRequest => 100,
        }
    }

    /// Map a wire value back to a message id.
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => MessageId::Connect,
            1 => MessageId::ServerInfo,
            2 => MessageId::Request,
            3 => MessageId::Response,
            4 => MessageId::RequestModelDef,
            5 => MessageId::ModelDef,
            6 => MessageId::RequestFrameOfData,
            7 => MessageId::FrameOfData,
            8 => MessageId::MessageString,
            9 => MessageId::Disconnect,
            10 => MessageId::KeepAlive,
            100 => MessageId::UnrecognizedRequest,
            _ => return None,
        })
    }

    /// Requests that carry no payload beyond the terminator.
    pub const fn is_empty_request(&self) -> bool {
        matches!(
            self,
            MessageId::RequestModelDef | MessageId::RequestFrameOfData | MessageId::KeepAlive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in [0u16, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 100] {
            let id = MessageId::from_code(code).expect("known code");
            assert_eq!(id.code(), code);
        }
        assert_eq!(MessageId::from_code(11), None);
        assert_eq!(MessageId::from_code(99), None);
    }
}

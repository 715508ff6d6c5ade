//! NatNet stream decoding and wire format.
//!
//! - [`decoder`] is the byte cursor that reads individual records
//! - [`format`] handles the datagram envelope and the payloads the client dispatches

pub mod decoder;
pub mod format;

pub use decoder::{Record, RecordKind, StreamDecoder};
pub use format::{Envelope, Response, ServerInfo};

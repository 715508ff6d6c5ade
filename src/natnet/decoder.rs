//! Cursor-based decoder for NatNet payloads
//!
//! A [`StreamDecoder`] walks an immutable byte buffer with a single read
//! offset. Each decode call reads one record at the cursor and advances past
//! it, so frame layouts are expressed as a sequence of calls:
//!
//! ```rust
//! use mocapflow::natnet::{RecordKind, StreamDecoder};
//!
//! let mut payload = Vec::new();
//! payload.extend_from_slice(&42u32.to_le_bytes());
//! payload.extend_from_slice(b"hand\0");
//!
//! let mut decoder = StreamDecoder::new(&payload);
//! assert_eq!(decoder.frame_number()?, 42);
//! assert_eq!(decoder.label()?, "hand");
//! assert_eq!(decoder.tell(), 9);
//! assert!(decoder.decode(RecordKind::Count).is_err());
//! # Ok::<(), mocapflow::MocapError>(())
//! ```
//!
//! Reads never go past the end of the buffer: a record that does not fit in
//! the remaining bytes fails with [`MocapError::Decode`] and leaves the cursor
//! where it was.

use crate::types::{LabeledMarkerSample, MarkerSample, RigidBodySample};
use crate::{MocapError, Result};
use std::fmt;

/// Record kinds the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Null-terminated UTF-8 string
    Label,
    /// u32 byte size (usually skipped)
    Size,
    /// u32 element count
    Count,
    /// u32 frame number
    FrameNumber,
    /// 3 x f32 position
    UnlabeledMarker,
    /// 3 x f32 position (pre-3.0 layout)
    LegacyMarker,
    /// Packed id, position, size, param, residual
    LabeledMarker,
    /// Id, position, quaternion, error, tracking flags
    RigidBody,
}

impl RecordKind {
    /// Fixed encoded width, or `None` for variable-length labels.
    pub const fn fixed_size(&self) -> Option<usize> {
        match self {
            RecordKind::Label => None,
            RecordKind::Size | RecordKind::Count | RecordKind::FrameNumber => Some(4),
            RecordKind::UnlabeledMarker | RecordKind::LegacyMarker => Some(MarkerSample::SIZE),
            RecordKind::LabeledMarker => Some(LabeledMarkerSample::SIZE),
            RecordKind::RigidBody => Some(RigidBodySample::SIZE),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            RecordKind::Label => "label",
            RecordKind::Size => "size",
            RecordKind::Count => "count",
            RecordKind::FrameNumber => "frame_number",
            RecordKind::UnlabeledMarker => "unlabeled_marker",
            RecordKind::LegacyMarker => "legacy_marker",
            RecordKind::LabeledMarker => "labeled_marker",
            RecordKind::RigidBody => "rigid_body",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Label(String),
    Size(u32),
    Count(u32),
    FrameNumber(u32),
    UnlabeledMarker(MarkerSample),
    LegacyMarker(MarkerSample),
    LabeledMarker(LabeledMarkerSample),
    RigidBody(RigidBodySample),
}

/// Stateful read cursor over a byte buffer.
#[derive(Debug, Clone)]
pub struct StreamDecoder<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> StreamDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Move the cursor by `delta` bytes (negative moves backwards).
    pub fn seek(&mut self, delta: isize) -> Result<()> {
        let target = self.offset.checked_add_signed(delta).filter(|&t| t <= self.data.len());
        match target {
            Some(target) => {
                self.offset = target;
                Ok(())
            }
            None => Err(MocapError::Decode {
                kind: format!("seek by {}", delta),
                offset: self.offset,
                needed: delta.unsigned_abs(),
                available: if delta < 0 { self.offset } else { self.remaining() },
            }),
        }
    }

    /// Current cursor offset from the start of the buffer.
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Encoded width of `count` records of `kind`.
    ///
    /// Labels have no fixed width and are rejected.
    pub fn sizeof(kind: RecordKind, count: usize) -> Result<usize> {
        let size = kind.fixed_size().ok_or_else(|| {
            MocapError::protocol("record sizing", format!("{} has no fixed width", kind))
        })?;
        size.checked_mul(count).ok_or_else(|| {
            MocapError::domain(format!("{} x {} overflows usize", count, kind))
        })
    }

    /// Decode one record of `kind` at the cursor.
    pub fn decode(&mut self, kind: RecordKind) -> Result<Record> {
        Ok(match kind {
            RecordKind::Label => Record::Label(self.label()?),
            RecordKind::Size => Record::Size(self.size()?),
            RecordKind::Count => Record::Count(self.count()?),
            RecordKind::FrameNumber => Record::FrameNumber(self.frame_number()?),
            RecordKind::UnlabeledMarker => Record::UnlabeledMarker(self.marker()?),
            RecordKind::LegacyMarker => Record::LegacyMarker(self.legacy_marker()?),
            RecordKind::LabeledMarker => Record::LabeledMarker(self.labeled_marker()?),
            RecordKind::RigidBody => Record::RigidBody(self.rigid_body()?),
        })
    }

    /// Null-terminated UTF-8 label; advances past the terminator.
    pub fn label(&mut self) -> Result<String> {
        let rest = &self.data[self.offset..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(MocapError::decode_short(
                RecordKind::Label.name(),
                self.offset,
                rest.len() + 1,
                rest.len(),
            ));
        };

        let label = std::str::from_utf8(&rest[..len]).map_err(|e| {
            MocapError::protocol(format!("label at offset {}", self.offset), e.to_string())
        })?;

        self.offset += len + 1;
        Ok(label.to_string())
    }

    pub fn size(&mut self) -> Result<u32> {
        self.read_u32(RecordKind::Size)
    }

    pub fn count(&mut self) -> Result<u32> {
        self.read_u32(RecordKind::Count)
    }

    pub fn frame_number(&mut self) -> Result<u32> {
        self.read_u32(RecordKind::FrameNumber)
    }

    pub fn marker(&mut self) -> Result<MarkerSample> {
        self.read_marker(RecordKind::UnlabeledMarker)
    }

    pub fn legacy_marker(&mut self) -> Result<MarkerSample> {
        self.read_marker(RecordKind::LegacyMarker)
    }

    pub fn labeled_marker(&mut self) -> Result<LabeledMarkerSample> {
        let b = self.take(RecordKind::LabeledMarker)?;
        Ok(LabeledMarkerSample {
            id: le_u32(b, 0),
            pos_x: le_f32(b, 4),
            pos_y: le_f32(b, 8),
            pos_z: le_f32(b, 12),
            size: le_f32(b, 16),
            param: le_i16(b, 20),
            residual: le_f32(b, 22),
        })
    }

    pub fn rigid_body(&mut self) -> Result<RigidBodySample> {
        let b = self.take(RecordKind::RigidBody)?;
        Ok(RigidBodySample {
            id: le_u32(b, 0),
            pos_x: le_f32(b, 4),
            pos_y: le_f32(b, 8),
            pos_z: le_f32(b, 12),
            rot_w: le_f32(b, 16),
            rot_x: le_f32(b, 20),
            rot_y: le_f32(b, 24),
            rot_z: le_f32(b, 28),
            error: le_f32(b, 32),
            tracking: le_i16(b, 36),
        })
    }

    fn read_u32(&mut self, kind: RecordKind) -> Result<u32> {
        let b = self.take(kind)?;
        Ok(le_u32(b, 0))
    }

    fn read_marker(&mut self, kind: RecordKind) -> Result<MarkerSample> {
        let b = self.take(kind)?;
        Ok(MarkerSample { pos_x: le_f32(b, 0), pos_y: le_f32(b, 4), pos_z: le_f32(b, 8) })
    }

    /// Borrow the next fixed-width record and advance past it.
    fn take(&mut self, kind: RecordKind) -> Result<&'a [u8]> {
        let width = kind.fixed_size().unwrap_or(0);
        let available = self.remaining();
        if available < width {
            return Err(MocapError::decode_short(kind.name(), self.offset, width, available));
        }
        let bytes = &self.data[self.offset..self.offset + width];
        self.offset += width;
        Ok(bytes)
    }
}

// Callers slice exactly the record width before these run.
fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le_f32(b: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le_i16(b: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([b[at], b[at + 1]])
}

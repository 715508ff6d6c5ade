//! Core types for motion-capture data representation.
//!
//! This module provides the records produced by the stream decoder and the
//! small amount of protocol vocabulary shared by the client.
//!
//! ## Architecture
//!
//! The types map directly to the NatNet wire records:
//! - [`MarkerSample`] is one unlabeled (or legacy) marker position
//! - [`LabeledMarkerSample`] carries a packed model/marker id
//! - [`RigidBodySample`] is a tracked pose with validity flags
//! - [`MarkerSet`] groups one frame's markers under a label
//! - [`FrameOfData`] is a decoded FRAMEOFDATA payload
//! - [`MessageId`] identifies each datagram
//! - [`ProtocolVersion`] is the zero-padded four-part version
//! - [`ServerDescription`] is what the handshake negotiated
//!
//! ## Usage Example
//!
//! ```rust
//! use mocapflow::types::{MarkerSample, MarkerSet};
//!
//! let set = MarkerSet::new("hand", 120, vec![MarkerSample::new(0.1, 0.2, 0.3)]);
//! assert_eq!(set.len(), 1);
//! assert_eq!(set.frame_number, 120);
//! ```

mod marker;
mod message;
mod rigid_body;
mod server;
mod version;

// Re-export all public types
pub use marker::{FrameOfData, LabeledMarkerSample, MarkerSample, MarkerSet};
pub use message::MessageId;
pub use rigid_body::RigidBodySample;
pub use server::ServerDescription;
pub use version::ProtocolVersion;

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_packed_ids_unpack_for_every_model_and_marker(
            model_id in any::<u16>(),
            marker_id in any::<u16>()
        ) {
            let marker = LabeledMarkerSample {
                id: LabeledMarkerSample::pack_id(model_id, marker_id),
                pos_x: 0.0,
                pos_y: 0.0,
                pos_z: 0.0,
                size: 0.0,
                param: 0,
                residual: 0.0,
            };
            prop_assert_eq!(marker.model_id(), model_id);
            prop_assert_eq!(marker.marker_id(), marker_id);
        }

        #[test]
        fn prop_rigid_body_validity_tracks_bit_zero(tracking in any::<i16>()) {
            let body = RigidBodySample {
                id: 1,
                pos_x: 0.0,
                pos_y: 0.0,
                pos_z: 0.0,
                rot_w: 1.0,
                rot_x: 0.0,
                rot_y: 0.0,
                rot_z: 0.0,
                error: 0.0,
                tracking,
            };
            prop_assert_eq!(body.is_valid(), (tracking & 1) == 1);
        }

        #[test]
        fn prop_versions_from_parts_are_padded(parts in prop::collection::vec(any::<u8>(), 0..4)) {
            let version = ProtocolVersion::from_parts(&parts);
            for (i, part) in version.0.iter().enumerate() {
                let expected = parts.get(i).copied().unwrap_or(0);
                prop_assert_eq!(*part, expected);
            }
        }
    }
}

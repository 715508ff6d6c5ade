//! Rigid body samples

use serde::{Deserialize, Serialize};

/// Rigid body pose as streamed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct RigidBodySample {
    pub id: u32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    /// Orientation quaternion (w, x, y, z).
    pub rot_w: f32,
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
    /// Mean marker error.
    pub error: f32,
    /// Tracking flags; bit 0 set when the pose is valid.
    pub tracking: i16,
}

impl RigidBodySample {
    /// Encoded width in bytes.
    pub const SIZE: usize = 38;

    /// Whether the server tracked this body in the frame.
    pub fn is_valid(&self) -> bool {
        (self.tracking & 0x01) != 0
    }
}

//! Marker samples and per-frame marker sets

use serde::{Deserialize, Serialize};

/// Unlabeled marker position, the smallest decodable unit.
///
/// Legacy markers share this layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct MarkerSample {
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
}

impl MarkerSample {
    /// Encoded width in bytes (3 x f32).
    pub const SIZE: usize = 12;

    pub fn new(pos_x: f32, pos_y: f32, pos_z: f32) -> Self {
        Self { pos_x, pos_y, pos_z }
    }
}

/// Labeled marker with a packed model/marker id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LabeledMarkerSample {
    /// Low 16 bits: marker id. High 16 bits: model id.
    pub id: u32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub size: f32,
    pub param: i16,
    pub residual: f32,
}

impl LabeledMarkerSample {
    /// Encoded width in bytes.
    pub const SIZE: usize = 26;

    /// Marker id within its model.
    pub fn marker_id(&self) -> u16 {
        (self.id & 0x0000_FFFF) as u16
    }

    /// Id of the model (asset) owning this marker.
    pub fn model_id(&self) -> u16 {
        (self.id >> 16) as u16
    }

    /// Pack a model id and marker id the way the server does.
    pub fn pack_id(model_id: u16, marker_id: u16) -> u32 {
        ((model_id as u32) << 16) | marker_id as u32
    }
}

/// A named group of markers captured in one frame.
///
/// Every marker in the set belongs to `frame_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct MarkerSet {
    pub label: String,
    pub frame_number: u32,
    pub markers: Vec<MarkerSample>,
}

impl MarkerSet {
    pub fn new(label: impl Into<String>, frame_number: u32, markers: Vec<MarkerSample>) -> Self {
        Self { label: label.into(), frame_number, markers }
    }

    /// Number of markers in the set.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Decoded FRAMEOFDATA payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FrameOfData {
    pub frame_number: u32,
    pub marker_sets: Vec<MarkerSet>,
}

impl FrameOfData {
    /// Total markers across all sets in the frame.
    pub fn marker_count(&self) -> usize {
        self.marker_sets.iter().map(MarkerSet::len).sum()
    }

    /// Look up a marker set by label.
    pub fn marker_set(&self, label: &str) -> Option<&MarkerSet> {
        self.marker_sets.iter().find(|set| set.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_marker_unpacks_ids() {
        let marker = LabeledMarkerSample {
            id: LabeledMarkerSample::pack_id(7, 42),
            pos_x: 0.0,
            pos_y: 0.0,
            pos_z: 0.0,
            size: 0.01,
            param: 0,
            residual: 0.0,
        };
        assert_eq!(marker.marker_id(), 42);
        assert_eq!(marker.model_id(), 7);
    }

    #[test]
    fn frame_counts_markers_across_sets() {
        let frame = FrameOfData {
            frame_number: 12,
            marker_sets: vec![
                MarkerSet::new("hand", 12, vec![MarkerSample::default(); 3]),
                MarkerSet::new("all", 12, vec![MarkerSample::default(); 5]),
            ],
        };
        assert_eq!(frame.marker_count(), 8);
        assert_eq!(frame.marker_set("hand").map(MarkerSet::len), Some(3));
        assert!(frame.marker_set("head").is_none());
    }
}

//! Tracking analytics over persisted marker positions.
//!
//! A [`Tracker`] reads rows of `frame_number, pos_x, pos_y, pos_z` (metres)
//! from a [`FrameSource`], converts them to millimetres, averages each frame's
//! markers and reports position, distance and velocity over a trailing
//! window of frames. Optional zero-phase low-pass smoothing
//! ([`LowPassFilter`]) can be applied to the averaged series first.
//!
//! [`CsvMarkerRecorder`] closes the loop with the client: registered as a
//! marker-set listener, it writes the rows a [`CsvFrameSource`] reads back.
//!
//! ```rust
//! use mocapflow::tracking::{MemoryFrameSource, PersistedRow, Tracker, TrackerConfig};
//!
//! # fn main() -> mocapflow::Result<()> {
//! let source = MemoryFrameSource::from_rows([
//!     PersistedRow::new(1, 0.0, 0.0, 0.0),
//!     PersistedRow::new(2, 0.0, 0.0, 0.002),
//! ]);
//! let tracker = Tracker::with_source(TrackerConfig::default(), source);
//! assert_eq!(tracker.distance(0)?, 2.0);
//! # Ok(())
//! # }
//! ```

mod filter;
mod recorder;
mod source;
mod tracker;

pub use filter::LowPassFilter;
pub use recorder::CsvMarkerRecorder;
pub use source::{CsvFrameSource, FrameSource, MemoryFrameSource, PersistedRow, REQUIRED_COLUMNS};
pub use tracker::{FrameRow, Position, Smoothing, Tracker, TrackerConfig};

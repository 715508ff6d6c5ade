//! NatNet motion-capture streaming and windowed kinematics.
//!
//! Mocapflow receives marker data from a NatNet-compatible tracking server
//! and turns persisted marker positions into position, distance and
//! velocity figures.
//!
//! # Features
//!
//! - **Stream decoding**: Bounds-checked little-endian record decoding
//! - **Protocol client**: Command and data channels over UDP, unicast or multicast
//! - **Typed callbacks**: Marker sets, server info, responses and messages
//! - **Analytics**: Windowed distance and velocity with optional zero-phase smoothing
//!
//! # Quick Start
//!
//! ## Example (streaming)
//!
//! ```rust,no_run
//! use mocapflow::{ClientSettings, Listeners, Mocapflow};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> mocapflow::Result<()> {
//!     let (listeners, mut sets) = Listeners::new().with_marker_set_stream(256);
//!     let mut client = Mocapflow::connect(ClientSettings::new(), listeners).await?;
//!
//!     while let Some(set) = sets.next().await {
//!         println!("{} @ {}: {} markers", set.label, set.frame_number, set.len());
//!     }
//!     client.shutdown().await
//! }
//! ```
//!
//! ## Example (analytics)
//!
//! ```rust,no_run
//! use mocapflow::{CsvFrameSource, Mocapflow, TrackerConfig};
//!
//! fn main() -> mocapflow::Result<()> {
//!     let tracker = Mocapflow::track(TrackerConfig::default(), CsvFrameSource::new("hand.csv"));
//!     println!("velocity: {:.1} mm/s", tracker.velocity(0)?);
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod types;

// Wire format
pub mod natnet;

// Protocol client
pub mod client;
pub mod listeners;
pub mod settings;

// Analytics
pub mod tracking;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use client::{ClientState, NatNetClient};
pub use listeners::{Listeners, MarkerSetStream};
pub use natnet::{Record, RecordKind, StreamDecoder};
pub use settings::ClientSettings;
pub use tracking::{
    CsvFrameSource, CsvMarkerRecorder, FrameSource, MemoryFrameSource, Position, Smoothing,
    Tracker, TrackerConfig,
};

/// Unified entry point for streaming and analytics.
///
/// # Examples
///
/// ## Live stream
/// ```rust,no_run
/// use mocapflow::{ClientSettings, Listeners, Mocapflow};
///
/// #[tokio::main]
/// async fn main() -> mocapflow::Result<()> {
///     let listeners = Listeners::new().on_marker_set(|set| println!("{:?}", set));
///     let mut client = Mocapflow::connect(ClientSettings::new(), listeners).await?;
///     // Use client...
///     client.shutdown().await
/// }
/// ```
pub struct Mocapflow;

impl Mocapflow {
    /// Create a client and start it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No marker-set listener is registered
    /// - Either socket cannot be bound (or the multicast group joined)
    pub async fn connect(settings: ClientSettings, listeners: Listeners) -> Result<NatNetClient> {
        let mut client = NatNetClient::new(settings, listeners);
        client.start().await?;
        Ok(client)
    }

    /// Create a tracker reading from `source`.
    pub fn track(config: TrackerConfig, source: impl FrameSource + 'static) -> Tracker {
        Tracker::with_source(config, source)
    }
}

//! Callback registry for decoded payloads
//!
//! One typed slot per message category. Callbacks run synchronously on the
//! receive task that decoded the payload, so they must return quickly; a slow
//! marker-set callback stalls the data channel.
//!
//! Consumers that would rather pull than be called can route marker sets
//! through a bounded channel:
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use mocapflow::Listeners;
//!
//! # async fn example() {
//! let (listeners, mut sets) = Listeners::new().with_marker_set_stream(256);
//! // hand `listeners` to the client, then:
//! while let Some(set) = sets.next().await {
//!     println!("{} @ {}: {} markers", set.label, set.frame_number, set.len());
//! }
//! # }
//! ```

use crate::natnet::Response;
use crate::types::{MarkerSet, ServerDescription};
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

pub type MarkerSetCallback = Arc<dyn Fn(&MarkerSet) + Send + Sync>;
pub type ServerInfoCallback = Arc<dyn Fn(&ServerDescription) + Send + Sync>;
pub type ResponseCallback = Arc<dyn Fn(&Response) + Send + Sync>;
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered callbacks, one per category.
///
/// A marker-set callback is required before the client will start.
#[derive(Clone, Default)]
pub struct Listeners {
    marker_set: Option<MarkerSetCallback>,
    server_info: Option<ServerInfoCallback>,
    response: Option<ResponseCallback>,
    message: Option<MessageCallback>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per decoded marker set.
    pub fn on_marker_set(mut self, callback: impl Fn(&MarkerSet) + Send + Sync + 'static) -> Self {
        self.marker_set = Some(Arc::new(callback));
        self
    }

    /// Called after each SERVERINFO reply with the updated description.
    pub fn on_server_info(
        mut self,
        callback: impl Fn(&ServerDescription) + Send + Sync + 'static,
    ) -> Self {
        self.server_info = Some(Arc::new(callback));
        self
    }

    /// Called for every command RESPONSE.
    pub fn on_response(mut self, callback: impl Fn(&Response) + Send + Sync + 'static) -> Self {
        self.response = Some(Arc::new(callback));
        self
    }

    /// Called for MESSAGESTRING payloads.
    pub fn on_message_string(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.message = Some(Arc::new(callback));
        self
    }

    /// Route marker sets into a bounded channel instead of a closure.
    ///
    /// When the consumer falls behind, sets are dropped (and counted) rather
    /// than blocking the receive task.
    pub fn with_marker_set_stream(self, capacity: usize) -> (Self, MarkerSetStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&dropped);

        let listeners = self.on_marker_set(move |set| {
            if let Err(e) = tx.try_send(set.clone()) {
                let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(label = %set.label, frame_number = set.frame_number, dropped = total, "Marker set stream full, dropping");
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        warn!(label = %set.label, dropped = total, "Marker set stream closed");
                    }
                }
            }
        });

        (listeners, MarkerSetStream { inner: ReceiverStream::new(rx), dropped })
    }

    pub fn has_marker_set_listener(&self) -> bool {
        self.marker_set.is_some()
    }

    pub(crate) fn emit_marker_set(&self, set: &MarkerSet) {
        if let Some(callback) = &self.marker_set {
            callback(set);
        }
    }

    pub(crate) fn emit_server_info(&self, description: &ServerDescription) {
        if let Some(callback) = &self.server_info {
            callback(description);
        }
    }

    pub(crate) fn emit_response(&self, response: &Response) {
        if let Some(callback) = &self.response {
            callback(response);
        }
    }

    pub(crate) fn emit_message_string(&self, message: &str) {
        if let Some(callback) = &self.message {
            callback(message);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("marker_set", &self.marker_set.is_some())
            .field("server_info", &self.server_info.is_some())
            .field("response", &self.response.is_some())
            .field("message", &self.message.is_some())
            .finish()
    }
}

/// Pull-based view of decoded marker sets.
pub struct MarkerSetStream {
    inner: ReceiverStream<MarkerSet>,
    dropped: Arc<AtomicU64>,
}

impl MarkerSetStream {
    /// Marker sets discarded because the stream was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Stream for MarkerSetStream {
    type Item = MarkerSet;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl fmt::Debug for MarkerSetStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerSetStream").field("dropped", &self.dropped()).finish()
    }
}

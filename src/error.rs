//! Error types for stream decoding, protocol handling and kinematic analytics.
//!
//! All errors implement the `std::error::Error` trait and carry enough
//! structured context to tell a short UDP datagram apart from a misconfigured
//! tracker.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: Buffers shorter than the record being read
//! - **Protocol Errors**: Malformed payloads or unknown message ids
//! - **Transport Errors**: Socket allocation, multicast join, send and receive failures
//! - **Command Errors**: Commands that still failed after every retry
//! - **Configuration Errors**: Missing data source or listener, locked settings, bad filter parameters
//! - **Domain Errors**: Negative frame counts, windows shorter than two frames
//! - **Integrity Errors**: Frames whose row count differs from the tracked marker count
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use mocapflow::MocapError;
//!
//! let error = MocapError::configuration("No data source was set");
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for mocapflow operations.
pub type Result<T, E = MocapError> = std::result::Result<T, E>;

/// Main error type for mocapflow operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MocapError {
    #[error("Cannot decode {kind} at offset {offset}: need {needed} bytes, have {available}")]
    Decode { kind: String, offset: usize, needed: usize, available: usize },

    #[error("Protocol error in {context}: {details}")]
    Protocol { context: String, details: String },

    #[error("Socket operation failed: {operation}")]
    Transport {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' failed after {attempts} attempts")]
    Command {
        command: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {reason}")]
    Configuration {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Setting '{field}' cannot change once the client has started")]
    SettingsLocked { field: String },

    #[error("Data source is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Invalid request: {reason}")]
    Domain { reason: String },

    #[error("Frame {frame_number} has {found} rows, expected {expected}")]
    FrameIntegrity { frame_number: i64, expected: usize, found: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Data source file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl MocapError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            MocapError::Transport { .. } => true,
            MocapError::Command { .. } => true,
            MocapError::Timeout { .. } => true,
            MocapError::File { .. } => true,
            MocapError::Decode { .. } => false,
            MocapError::Protocol { .. } => false,
            MocapError::Configuration { .. } => false,
            MocapError::SettingsLocked { .. } => false,
            MocapError::Schema { .. } => false,
            MocapError::Domain { .. } => false,
            MocapError::FrameIntegrity { .. } => false,
            MocapError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MocapError::Decode { .. } => vec![
                "Check the requested bitstream version matches the server",
                "Verify the datagram was not truncated by the network",
            ],
            MocapError::Protocol { .. } => vec![
                "Check server and client protocol versions agree",
                "Inspect the raw datagram for corruption",
            ],
            MocapError::Transport { .. } => vec![
                "Check the local interface address exists on this host",
                "Ensure the data port is not already bound by another client",
                "Verify the server's multicast/unicast mode matches the client",
            ],
            MocapError::Command { .. } => vec![
                "Check the server address and command port",
                "Verify the tracking server is running",
                "Retry the command",
            ],
            MocapError::Configuration { .. } => vec![
                "Set the data source before querying",
                "Register a marker-set listener before starting the client",
                "Check the filter cutoff is below the Nyquist frequency",
            ],
            MocapError::SettingsLocked { .. } => vec![
                "Apply settings before starting the client",
                "Create a new client with the desired settings",
            ],
            MocapError::Schema { .. } => vec![
                "Ensure the data file header names frame_number, pos_x, pos_y, pos_z",
                "Check the delimiter is a comma",
            ],
            MocapError::Domain { .. } => vec![
                "Use a non-negative frame count",
                "Use a window covering at least two frames",
            ],
            MocapError::FrameIntegrity { .. } => vec![
                "Check the configured marker count matches the tracked marker set",
                "Check the recorder is not interleaving multiple marker sets",
                "Wait for the in-flight frame to be written completely",
            ],
            MocapError::Parse { .. } => vec![
                "Check the data format",
                "Verify the source file is not being written concurrently",
            ],
            MocapError::File { .. } => vec![
                "Check the data file exists and is readable",
                "Check file permissions",
            ],
            MocapError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Verify the tracking server is responding",
            ],
        }
    }

    /// Helper constructor for short-buffer decode errors.
    pub fn decode_short(
        kind: impl Into<String>,
        offset: usize,
        needed: usize,
        available: usize,
    ) -> Self {
        MocapError::Decode { kind: kind.into(), offset, needed, available }
    }

    /// Helper constructor for protocol errors.
    pub fn protocol(context: impl Into<String>, details: impl Into<String>) -> Self {
        MocapError::Protocol { context: context.into(), details: details.into() }
    }

    /// Helper constructor for socket failures.
    pub fn transport(operation: impl Into<String>, source: std::io::Error) -> Self {
        MocapError::Transport { operation: operation.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn configuration(reason: impl Into<String>) -> Self {
        MocapError::Configuration { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn configuration_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        MocapError::Configuration { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for domain errors.
    pub fn domain(reason: impl Into<String>) -> Self {
        MocapError::Domain { reason: reason.into() }
    }

    /// Helper constructor for locked-settings errors.
    pub fn settings_locked(field: impl Into<String>) -> Self {
        MocapError::SettingsLocked { field: field.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        MocapError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for data source file errors.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        MocapError::File { path, source }
    }
}

impl From<std::io::Error> for MocapError {
    fn from(err: std::io::Error) -> Self {
        MocapError::Transport { operation: "<unknown>".to_string(), source: err }
    }
}

//! Error types for circuit-telemetry

use std::path::PathBuf;

use thiserror::Error;

/// Result type for telemetry source operations
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

/// Errors a telemetry source can report while collecting device state
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The device rejected or failed to run the command
    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// The command ran but the parser produced nothing
    #[error("command `{command}` returned no parseable output")]
    EmptyOutput { command: String },

    /// No snapshot document exists for the device
    #[error("no telemetry snapshot at {}", path.display())]
    SnapshotNotFound { path: PathBuf },

    /// Snapshot document could not be decoded
    #[error("failed to decode telemetry snapshot: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error while reading a snapshot
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

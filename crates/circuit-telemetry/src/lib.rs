//! Circuit telemetry: parsed device state consumed by the conformance engine.
//!
//! This crate owns the seam between the engine and whatever talks to the
//! device. Nothing here issues commands or parses CLI text; it only defines:
//!
//! - record types for interface counters, BGP neighbours and ping results
//! - the async [`TelemetrySource`] trait the engine reads through
//! - [`SnapshotSource`], a source backed by a pre-collected JSON document
//! - in-memory fakes for tests via the `fakes` module

mod error;
pub mod fakes;
pub mod records;
pub mod snapshot_file;
pub mod source;

pub use error::{TelemetryError, TelemetryResult};
pub use records::{
    AddressFamilyRoutes, BgpNeighborRecord, ErrorCounters, InterfaceCounters, Ipv4Binding,
    PingResult, PingStatistics, RoundTrip, DEFAULT_ADDRESS_FAMILY,
};
pub use snapshot_file::{DeviceTelemetry, PingEntry, SnapshotSource};
pub use source::{PingRequest, TelemetrySource};

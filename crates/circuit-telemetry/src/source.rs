//! The telemetry source seam.
//!
//! The engine never talks to a device directly. It reads through
//! [`TelemetrySource`], one instance per device, and expects every call to
//! return already-parsed records. Implementations decide how commands are
//! issued, authenticated and parsed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TelemetryResult;
use crate::records::{BgpNeighborRecord, InterfaceCounters, PingResult};

/// Parameters of a single ping invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PingRequest {
    /// Target address.
    pub address: String,
    /// VRF to ping from. `None` uses the global table; some platforms reject
    /// an explicit global VRF name, so the default is never spelled out.
    pub vrf: Option<String>,
    /// Source interface.
    pub source: String,
    /// Number of echo requests.
    pub count: u32,
}

impl PingRequest {
    pub fn new(address: impl Into<String>, source: impl Into<String>, count: u32) -> Self {
        Self {
            address: address.into(),
            vrf: None,
            source: source.into(),
            count,
        }
    }

    /// Scope the ping to a VRF (builder pattern).
    pub fn with_vrf(mut self, vrf: Option<String>) -> Self {
        self.vrf = vrf;
        self
    }
}

/// Read-only view of one device's state.
///
/// Guarantees:
/// - `Ok(None)` means the device answered but has no such object
///   (unknown interface, no neighbour in that VRF, empty ping output).
/// - `Err(_)` means the question could not be asked or answered.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Parsed counters for one interface.
    async fn interface_counters(&self, interface: &str)
        -> TelemetryResult<Option<InterfaceCounters>>;

    /// Session and route state for one neighbour in one VRF.
    async fn bgp_neighbor(
        &self,
        vrf: &str,
        neighbor_ip: &str,
    ) -> TelemetryResult<Option<BgpNeighborRecord>>;

    /// Run a ping and return its statistics.
    async fn ping(&self, request: &PingRequest) -> TelemetryResult<Option<PingResult>>;
}

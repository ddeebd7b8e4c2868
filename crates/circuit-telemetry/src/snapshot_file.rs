//! Telemetry source backed by a pre-collected JSON snapshot.
//!
//! A collector that already ran against a device writes one document per
//! device (`<dir>/<device>.json`). [`SnapshotSource`] serves the engine's
//! questions from that document without touching the network.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TelemetryError, TelemetryResult};
use crate::records::{BgpNeighborRecord, InterfaceCounters, PingResult};
use crate::source::{PingRequest, TelemetrySource};

/// Recorded outcome of pinging `address` (optionally inside `vrf`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingEntry {
    pub address: String,
    #[serde(default)]
    pub vrf: Option<String>,
    pub result: PingResult,
}

/// Everything collected from one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTelemetry {
    /// Hostname the snapshot was taken from.
    pub device: Option<String>,
    /// Interface counters keyed by interface name.
    pub interfaces: BTreeMap<String, InterfaceCounters>,
    /// Neighbour records keyed by VRF, then neighbour IP.
    pub bgp: BTreeMap<String, BTreeMap<String, BgpNeighborRecord>>,
    pub pings: Vec<PingEntry>,
}

/// [`TelemetrySource`] answering from a [`DeviceTelemetry`] document.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    telemetry: DeviceTelemetry,
}

impl SnapshotSource {
    pub fn new(telemetry: DeviceTelemetry) -> Self {
        Self { telemetry }
    }

    /// Path of the snapshot document for `device` inside `dir`.
    pub fn path_for(dir: &Path, device: &str) -> PathBuf {
        dir.join(format!("{device}.json"))
    }

    /// Load a snapshot document from disk.
    pub async fn load(path: &Path) -> TelemetryResult<Self> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TelemetryError::SnapshotNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let telemetry: DeviceTelemetry = serde_json::from_slice(&raw)?;
        debug!(
            path = %path.display(),
            interfaces = telemetry.interfaces.len(),
            vrfs = telemetry.bgp.len(),
            pings = telemetry.pings.len(),
            "loaded telemetry snapshot"
        );
        Ok(Self::new(telemetry))
    }

    /// Load the snapshot for `device` from `dir`.
    pub async fn load_device(dir: &Path, device: &str) -> TelemetryResult<Self> {
        Self::load(&Self::path_for(dir, device)).await
    }

    pub fn telemetry(&self) -> &DeviceTelemetry {
        &self.telemetry
    }
}

#[async_trait]
impl TelemetrySource for SnapshotSource {
    async fn interface_counters(
        &self,
        interface: &str,
    ) -> TelemetryResult<Option<InterfaceCounters>> {
        Ok(self.telemetry.interfaces.get(interface).cloned())
    }

    async fn bgp_neighbor(
        &self,
        vrf: &str,
        neighbor_ip: &str,
    ) -> TelemetryResult<Option<BgpNeighborRecord>> {
        Ok(self
            .telemetry
            .bgp
            .get(vrf)
            .and_then(|neighbors| neighbors.get(neighbor_ip))
            .cloned())
    }

    async fn ping(&self, request: &PingRequest) -> TelemetryResult<Option<PingResult>> {
        Ok(self
            .telemetry
            .pings
            .iter()
            .find(|entry| entry.address == request.address && entry.vrf == request.vrf)
            .map(|entry| entry.result.clone()))
    }
}

//! In-memory fakes for the telemetry source (testing only)
//!
//! [`ScriptedSource`] answers from a [`DeviceTelemetry`] document like
//! [`SnapshotSource`](crate::SnapshotSource), records every call it receives,
//! and can be told to fail specific questions.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{TelemetryError, TelemetryResult};
use crate::records::{BgpNeighborRecord, InterfaceCounters, PingResult};
use crate::snapshot_file::{DeviceTelemetry, PingEntry};
use crate::source::{PingRequest, TelemetrySource};

/// One call observed by a [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    InterfaceCounters(String),
    BgpNeighbor { vrf: String, neighbor_ip: String },
    Ping(PingRequest),
}

/// Scriptable telemetry source backed by a `DeviceTelemetry` document.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    telemetry: DeviceTelemetry,
    failing_interfaces: HashSet<String>,
    failing_neighbors: HashSet<String>,
    failing_pings: HashSet<String>,
    calls: Mutex<Vec<SourceCall>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_telemetry(telemetry: DeviceTelemetry) -> Self {
        Self {
            telemetry,
            ..Self::default()
        }
    }

    pub fn with_interface(mut self, name: &str, counters: InterfaceCounters) -> Self {
        self.telemetry.interfaces.insert(name.to_string(), counters);
        self
    }

    pub fn with_neighbor(mut self, vrf: &str, neighbor_ip: &str, record: BgpNeighborRecord) -> Self {
        self.telemetry
            .bgp
            .entry(vrf.to_string())
            .or_default()
            .insert(neighbor_ip.to_string(), record);
        self
    }

    pub fn with_ping(mut self, address: &str, vrf: Option<&str>, result: PingResult) -> Self {
        self.telemetry.pings.push(PingEntry {
            address: address.to_string(),
            vrf: vrf.map(str::to_string),
            result,
        });
        self
    }

    /// Make `interface_counters(name)` fail.
    pub fn fail_interface(mut self, name: &str) -> Self {
        self.failing_interfaces.insert(name.to_string());
        self
    }

    /// Make `bgp_neighbor(_, neighbor_ip)` fail.
    pub fn fail_neighbor(mut self, neighbor_ip: &str) -> Self {
        self.failing_neighbors.insert(neighbor_ip.to_string());
        self
    }

    /// Make every ping towards `address` fail.
    pub fn fail_ping(mut self, address: &str) -> Self {
        self.failing_pings.insert(address.to_string());
        self
    }

    /// Snapshot of the calls received so far, in order.
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Ping requests received so far, in order.
    pub fn ping_requests(&self) -> Vec<PingRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SourceCall::Ping(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SourceCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    async fn interface_counters(
        &self,
        interface: &str,
    ) -> TelemetryResult<Option<InterfaceCounters>> {
        self.record(SourceCall::InterfaceCounters(interface.to_string()));
        if self.failing_interfaces.contains(interface) {
            return Err(TelemetryError::CommandFailed {
                command: format!("show interface {interface}"),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self.telemetry.interfaces.get(interface).cloned())
    }

    async fn bgp_neighbor(
        &self,
        vrf: &str,
        neighbor_ip: &str,
    ) -> TelemetryResult<Option<BgpNeighborRecord>> {
        self.record(SourceCall::BgpNeighbor {
            vrf: vrf.to_string(),
            neighbor_ip: neighbor_ip.to_string(),
        });
        if self.failing_neighbors.contains(neighbor_ip) {
            return Err(TelemetryError::EmptyOutput {
                command: format!("show ip bgp neighbor {neighbor_ip}"),
            });
        }
        Ok(self
            .telemetry
            .bgp
            .get(vrf)
            .and_then(|neighbors| neighbors.get(neighbor_ip))
            .cloned())
    }

    async fn ping(&self, request: &PingRequest) -> TelemetryResult<Option<PingResult>> {
        self.record(SourceCall::Ping(request.clone()));
        if self.failing_pings.contains(&request.address) {
            return Err(TelemetryError::CommandFailed {
                command: format!("ping {}", request.address),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self
            .telemetry
            .pings
            .iter()
            .find(|entry| entry.address == request.address && entry.vrf == request.vrf)
            .map(|entry| entry.result.clone()))
    }
}

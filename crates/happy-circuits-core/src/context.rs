//! Per-circuit evaluation context.
//!
//! A [`CircuitContext`] pairs one circuit with the telemetry collected for
//! it. It is built by the runner, handed to the validators by reference and
//! dropped when the circuit finishes. Validators never reach outside it.

use std::collections::BTreeMap;

use circuit_telemetry::{
    BgpNeighborRecord, InterfaceCounters, PingRequest, PingResult, PingStatistics,
    TelemetryResult, TelemetrySource,
};
use tracing::{debug, warn};

use crate::error::CheckError;
use crate::extract::parent_interface;
use crate::intent::Circuit;
use crate::obs;
use crate::runner::RunnerConfig;

/// Outcome of one telemetry question.
#[derive(Debug, Clone, PartialEq)]
pub enum Collected<T> {
    /// The intent did not ask for it.
    NotRequested,
    Found(T),
    /// The device answered but has no such object.
    Missing,
    /// The question could not be asked or answered.
    Failed(String),
}

impl<T> Collected<T> {
    pub fn from_result(result: TelemetryResult<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Collected::Found(value),
            Ok(None) => Collected::Missing,
            Err(err) => Collected::Failed(err.to_string()),
        }
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Collected::Found(value) => Some(value),
            _ => None,
        }
    }

    /// The collected value, or the check error describing why there is none.
    pub fn require(&self, what: &str) -> Result<&T, CheckError> {
        match self {
            Collected::Found(value) => Ok(value),
            Collected::Missing => Err(CheckError::missing(what)),
            Collected::NotRequested => Err(CheckError::TelemetryUnavailable {
                what: what.to_string(),
                reason: "not collected".to_string(),
            }),
            Collected::Failed(reason) => Err(CheckError::TelemetryUnavailable {
                what: what.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Everything the validators may read about one circuit.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    /// Name the physical counters were read from.
    pub physical_interface: String,
    /// Parent interface counters (the circuit's own interface when it is
    /// not a sub-interface).
    pub physical: Collected<InterfaceCounters>,
    /// Counters of the circuit's own interface.
    pub logical: Collected<InterfaceCounters>,
    pub bgp_vrf: String,
    /// Keyed by neighbour address.
    pub bgp_neighbors: BTreeMap<String, Collected<BgpNeighborRecord>>,
    pub ping: Collected<PingResult>,
}

impl TelemetrySnapshot {
    /// A snapshot with nothing collected.
    pub fn empty(circuit: &Circuit) -> Self {
        Self {
            physical_interface: circuit.interface.clone(),
            physical: Collected::NotRequested,
            logical: Collected::NotRequested,
            bgp_vrf: circuit.tests.bgp.resolved_vrf().to_string(),
            bgp_neighbors: BTreeMap::new(),
            ping: Collected::NotRequested,
        }
    }

    pub fn physical(&self) -> Result<&InterfaceCounters, CheckError> {
        self.physical
            .require(&format!("interface {}", self.physical_interface))
    }

    pub fn logical(&self, interface: &str) -> Result<&InterfaceCounters, CheckError> {
        self.logical.require(&format!("interface {interface}"))
    }

    pub fn neighbor(&self, neighbor_ip: &str) -> Option<&Collected<BgpNeighborRecord>> {
        self.bgp_neighbors.get(neighbor_ip)
    }

    /// Statistics of the measured ping.
    pub fn ping_statistics(&self) -> Result<&PingStatistics, CheckError> {
        self.ping
            .require("ping")?
            .statistics
            .as_ref()
            .ok_or_else(|| CheckError::missing("ping.statistics"))
    }
}

/// One circuit and its collected telemetry.
#[derive(Debug, Clone)]
pub struct CircuitContext<'a> {
    pub circuit: &'a Circuit,
    pub snapshot: TelemetrySnapshot,
}

impl<'a> CircuitContext<'a> {
    pub fn new(circuit: &'a Circuit, snapshot: TelemetrySnapshot) -> Self {
        Self { circuit, snapshot }
    }

    /// `"<circuit id>-<interface>"`, the name of the circuit's step.
    pub fn label(&self) -> String {
        format!("{}-{}", self.circuit.id, self.circuit.interface)
    }
}

/// Ask `source` everything the circuit's intent needs.
///
/// Only requested domains are collected. Telemetry failures are recorded in
/// the snapshot and surface later as `errored` or `skipped` checks; this
/// function itself never fails.
pub async fn collect_snapshot(
    circuit: &Circuit,
    source: &dyn TelemetrySource,
    config: &RunnerConfig,
) -> TelemetrySnapshot {
    let mut snapshot = TelemetrySnapshot::empty(circuit);

    if circuit.tests.interface.test_interface {
        collect_interfaces(circuit, source, &mut snapshot).await;
    }

    if circuit.tests.bgp.test_bgp {
        let vrf = snapshot.bgp_vrf.clone();
        for neighbor in &circuit.tests.bgp.neighbors {
            let collected =
                Collected::from_result(source.bgp_neighbor(&vrf, &neighbor.neighbor_ip).await);
            if let Collected::Failed(reason) = &collected {
                obs::emit_collection_error(&circuit.id, "bgp", reason);
            }
            snapshot
                .bgp_neighbors
                .insert(neighbor.neighbor_ip.clone(), collected);
        }
    }

    if circuit.tests.icmp.test_icmp {
        snapshot.ping = collect_ping(circuit, source, config).await;
    }

    snapshot
}

async fn collect_interfaces(
    circuit: &Circuit,
    source: &dyn TelemetrySource,
    snapshot: &mut TelemetrySnapshot,
) {
    if !circuit.is_subinterface {
        let collected = Collected::from_result(source.interface_counters(&circuit.interface).await);
        if let Collected::Failed(reason) = &collected {
            obs::emit_collection_error(&circuit.id, "interface", reason);
        }
        snapshot.physical = collected.clone();
        snapshot.logical = collected;
        return;
    }

    match parent_interface(&circuit.interface) {
        Ok(parent) => {
            let collected = Collected::from_result(source.interface_counters(&parent).await);
            if let Collected::Failed(reason) = &collected {
                obs::emit_collection_error(&circuit.id, "interface", reason);
            }
            snapshot.physical_interface = parent;
            snapshot.physical = collected;
        }
        Err(err) => snapshot.physical = Collected::Failed(err.to_string()),
    }

    let collected = Collected::from_result(source.interface_counters(&circuit.interface).await);
    if let Collected::Failed(reason) = &collected {
        obs::emit_collection_error(&circuit.id, "interface", reason);
    }
    snapshot.logical = collected;
}

async fn collect_ping(
    circuit: &Circuit,
    source: &dyn TelemetrySource,
    config: &RunnerConfig,
) -> Collected<PingResult> {
    let icmp = &circuit.tests.icmp;
    let Some(address) = icmp.pingable_address.as_deref() else {
        return Collected::Failed("no pingable_address declared".to_string());
    };

    // Warm-up populates the ARP cache so the measured ping does not lose its
    // first echo. Its outcome is never asserted on.
    let warm_up =
        PingRequest::new(address, circuit.interface.as_str(), 1).with_vrf(icmp.vrf.clone());
    match source.ping(&warm_up).await {
        Ok(_) => debug!(circuit = %circuit.id, address = %address, "warm-up ping sent"),
        Err(err) => warn!(circuit = %circuit.id, address = %address, error = %err, "warm-up ping failed"),
    }

    let count = icmp.ping_count.unwrap_or(config.default_ping_count);
    let measured =
        PingRequest::new(address, circuit.interface.as_str(), count).with_vrf(icmp.vrf.clone());
    let collected = Collected::from_result(source.ping(&measured).await);
    if let Collected::Failed(reason) = &collected {
        obs::emit_collection_error(&circuit.id, "icmp", reason);
    }
    collected
}

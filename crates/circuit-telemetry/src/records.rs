//! Normalized telemetry records.
//!
//! Every field a device parser might fail to produce is an `Option`, so the
//! engine can tell "field absent" apart from "field present with a bad value".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Key of the default (unscoped) BGP address family in
/// [`BgpNeighborRecord::address_families`].
pub const DEFAULT_ADDRESS_FAMILY: &str = "";

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Error and collision counters of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCounters {
    pub in_errors: Option<i64>,
    pub in_crc_errors: Option<i64>,
    pub out_errors: Option<i64>,
    pub out_collision: Option<i64>,
}

/// One IPv4 binding on an interface, keyed by address in
/// [`InterfaceCounters::ipv4`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipv4Binding {
    pub ip: Option<String>,
    pub prefix_length: Option<String>,
}

/// Parsed `show interface` output for a single interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceCounters {
    /// e.g. "full", "half"
    pub duplex_mode: Option<String>,
    pub enabled: Option<bool>,
    /// e.g. "up", "down"
    pub line_protocol: Option<String>,
    pub counters: Option<ErrorCounters>,
    /// Load as reported by the device, formatted `"<used>/255"`.
    pub txload: Option<String>,
    pub rxload: Option<String>,
    /// Bound addresses keyed by `"<ip>/<prefix length>"`.
    pub ipv4: Option<BTreeMap<String, Ipv4Binding>>,
}

// ---------------------------------------------------------------------------
// BGP
// ---------------------------------------------------------------------------

/// Route keys for one address family of a neighbour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressFamilyRoutes {
    /// Prefixes advertised to the neighbour, with prefix length.
    pub advertised: BTreeSet<String>,
    /// Prefixes received from the neighbour. The device parser drops the
    /// prefix length here, so keys are bare network addresses.
    pub received: BTreeSet<String>,
}

/// Session state of one BGP neighbour within a VRF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpNeighborRecord {
    /// Session transport uptime in milliseconds. Absent when the session is down.
    pub session_uptime_ms: Option<i64>,
    /// Route sets keyed by address family name, [`DEFAULT_ADDRESS_FAMILY`] for
    /// the unscoped family.
    pub address_families: BTreeMap<String, AddressFamilyRoutes>,
}

impl BgpNeighborRecord {
    /// Route sets for the given family, if the device reported any.
    pub fn family(&self, name: &str) -> Option<&AddressFamilyRoutes> {
        self.address_families.get(name)
    }
}

// ---------------------------------------------------------------------------
// ICMP
// ---------------------------------------------------------------------------

/// Round-trip timing of a ping invocation, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTrip {
    pub min_ms: Option<i64>,
    pub avg_ms: Option<i64>,
    pub max_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingStatistics {
    pub send: Option<u32>,
    pub received: Option<u32>,
    pub success_rate_percent: Option<i64>,
    pub round_trip: Option<RoundTrip>,
}

/// Result of one ping invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingResult {
    pub statistics: Option<PingStatistics>,
}

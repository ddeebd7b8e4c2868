//! Intent document: what the operator expects each circuit to look like.
//!
//! The document is YAML shaped as
//!
//! ```yaml
//! config:
//!   devices:
//!     edge-1:
//!       circuits:
//!         - circuit: CIR-1001
//!           interface: GigabitEthernet0/1.100
//!           is_subinterface: true
//!           tests:
//!             interface: { test_interface: true, line_protocol: up, in_errors_conform: "le 10" }
//!             icmp: { test_icmp: true, pingable_address: 10.0.0.2, success_rate_percent_conform: "ge 80" }
//!             bgp: { test_bgp: false }
//! ```
//!
//! Conform rules stay raw strings here. They are parsed by the check that
//! uses them so a malformed rule errors that check alone.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDocument {
    pub config: IntentConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentConfig {
    pub devices: BTreeMap<String, DeviceIntent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIntent {
    pub circuits: Vec<Circuit>,
}

/// One logical attachment point under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    /// Operator-facing circuit identifier.
    #[serde(rename = "circuit")]
    pub id: String,
    pub interface: String,
    #[serde(default)]
    pub is_subinterface: bool,
    pub tests: CircuitTests,
}

/// Per-domain test specs. All three domains must be declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitTests {
    pub interface: InterfaceTestSpec,
    pub icmp: IcmpTestSpec,
    pub bgp: BgpTestSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceTestSpec {
    pub test_interface: bool,
    pub line_protocol: Option<String>,
    pub enabled: Option<bool>,
    pub duplex: Option<String>,
    pub ipv4: Option<String>,
    pub in_errors_conform: Option<String>,
    pub in_crc_errors_conform: Option<String>,
    pub out_errors_conform: Option<String>,
    pub out_collision_conform: Option<String>,
    pub txload_conform: Option<String>,
    pub rxload_conform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcmpTestSpec {
    pub test_icmp: bool,
    pub pingable_address: Option<String>,
    pub vrf: Option<String>,
    pub ping_count: Option<u32>,
    pub success_rate_percent_conform: Option<String>,
    pub max_ms_conform: Option<String>,
    pub jitter_conform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpTestSpec {
    pub test_bgp: bool,
    pub vrf: Option<String>,
    pub neighbors: Vec<NeighborSpec>,
}

impl BgpTestSpec {
    pub const DEFAULT_VRF: &'static str = "default";

    /// Declared VRF, `"default"` when unset or blank.
    pub fn resolved_vrf(&self) -> &str {
        match self.vrf.as_deref() {
            Some(vrf) if !vrf.trim().is_empty() => vrf,
            _ => Self::DEFAULT_VRF,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborSpec {
    pub neighbor_ip: String,
    pub uptime_conform: Option<String>,
    pub address_families: Vec<AddressFamilySpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressFamilySpec {
    pub address_family: Option<String>,
    pub advertised_routes: Vec<String>,
    pub received_routes: Vec<String>,
}

impl IntentDocument {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Intent for one device.
    pub fn device(&self, name: &str) -> Result<&DeviceIntent> {
        self.config
            .devices
            .get(name)
            .ok_or_else(|| EngineError::UnknownDevice(name.to_string()))
    }

    /// Structural checks the engine relies on but serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.config.devices.is_empty() {
            return Err(EngineError::InvalidIntent(
                "config.devices is empty".to_string(),
            ));
        }

        for (device, intent) in &self.config.devices {
            if intent.circuits.is_empty() {
                return Err(EngineError::InvalidIntent(format!(
                    "device {device} declares no circuits"
                )));
            }

            let mut seen = HashSet::new();
            for circuit in &intent.circuits {
                if circuit.id.trim().is_empty() {
                    return Err(EngineError::InvalidIntent(format!(
                        "device {device} has a circuit with an empty id"
                    )));
                }
                if circuit.interface.trim().is_empty() {
                    return Err(EngineError::InvalidIntent(format!(
                        "circuit {} on {device} has an empty interface name",
                        circuit.id
                    )));
                }
                if !seen.insert(circuit.id.as_str()) {
                    return Err(EngineError::InvalidIntent(format!(
                        "circuit {} is declared twice on {device}",
                        circuit.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// SHA-256 hex of the canonical JSON form.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }
}

//! happy-circuits core library
//!
//! Evaluates whether network circuits conform to their declared intent:
//! intent loading, the conform-rule comparator, field extractors, the step
//! tree, the interface/ICMP/BGP validators and the circuit runner.

pub mod conform;
pub mod context;
pub mod error;
pub mod extract;
pub mod intent;
pub mod logging;
pub mod obs;
pub mod report;
pub mod runner;
pub mod step;
pub mod validate;

pub use conform::{evaluate, parse_rule, ConformOp, ConformRule};
pub use context::{collect_snapshot, CircuitContext, Collected, TelemetrySnapshot};
pub use error::{CheckError, EngineError, Result};
pub use extract::{load_numerator, milliseconds_to_days, parent_interface, LOAD_SCALE};
pub use intent::{
    AddressFamilySpec, BgpTestSpec, Circuit, CircuitTests, DeviceIntent, IcmpTestSpec,
    IntentConfig, IntentDocument, InterfaceTestSpec, NeighborSpec,
};
pub use logging::init_tracing;
pub use report::{
    read_report_json, render_text, write_report_json, ConformanceReport, VerdictSummary,
    REPORT_SCHEMA_VERSION,
};
pub use runner::{evaluate_circuit, CircuitRunner, DeviceTarget, RunnerConfig};
pub use step::{ensure, StepExit, StepNode, StepResult, StepScope, Verdict};
pub use validate::{resolve_address_family, validate_bgp, validate_icmp, validate_interface};

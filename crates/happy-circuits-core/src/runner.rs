//! Circuit runner: collects telemetry, evaluates every circuit and assembles
//! the per-device report.
//!
//! Telemetry is collected with bounded concurrency, circuits through a
//! buffered stream and devices through a semaphore. Evaluation itself is
//! synchronous and only touches the circuit's own context.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use circuit_telemetry::TelemetrySource;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::context::{collect_snapshot, CircuitContext};
use crate::intent::{Circuit, DeviceIntent};
use crate::obs::{self, CircuitSpan, RunSpan};
use crate::report::{ConformanceReport, REPORT_SCHEMA_VERSION};
use crate::step::{StepExit, StepNode};
use crate::validate::{validate_bgp, validate_icmp, validate_interface};

/// Runtime knobs of a conformance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Devices evaluated at the same time.
    pub max_concurrent_devices: usize,
    /// Circuits of one device collected at the same time.
    pub max_concurrent_circuits: usize,
    /// Echo requests of the measured ping when the intent leaves it unset.
    pub default_ping_count: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_devices: 4,
            max_concurrent_circuits: 8,
            default_ping_count: 5,
        }
    }
}

/// One device to evaluate, with the source its telemetry is read from.
#[derive(Clone)]
pub struct DeviceTarget {
    pub device: String,
    pub intent: DeviceIntent,
    pub source: Arc<dyn TelemetrySource>,
}

#[derive(Debug, Clone, Default)]
pub struct CircuitRunner {
    config: RunnerConfig,
}

impl CircuitRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Evaluate every circuit of one device.
    ///
    /// Circuit order in the report follows the intent regardless of the
    /// order telemetry arrives in. Telemetry problems never fail the run,
    /// they surface as verdicts.
    #[instrument(skip(self, intent, intent_digest, source), fields(circuits = intent.circuits.len()))]
    pub async fn run_device(
        &self,
        device: &str,
        intent: &DeviceIntent,
        intent_digest: &str,
        source: Arc<dyn TelemetrySource>,
    ) -> ConformanceReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        obs::emit_run_started(&run_id.to_string(), device, intent.circuits.len());

        let width = self.config.max_concurrent_circuits.max(1);
        let pending: Vec<_> = intent
            .circuits
            .iter()
            .map(|circuit| self.run_circuit(circuit, source.as_ref()))
            .collect();
        let circuit_nodes: Vec<StepNode> = stream::iter(pending).buffered(width).collect().await;

        let root = {
            let _span = RunSpan::enter(&run_id.to_string(), device);
            StepNode::run(device, |root| {
                for node in circuit_nodes {
                    root.attach(node);
                }
                Ok(())
            })
        };

        let report = ConformanceReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id,
            device: device.to_string(),
            intent_digest: intent_digest.to_string(),
            started_at,
            finished_at: Utc::now(),
            root,
        };
        obs::emit_run_finished(
            &run_id.to_string(),
            device,
            clock.elapsed().as_millis() as u64,
            &report.summary(),
        );
        report
    }

    async fn run_circuit(&self, circuit: &Circuit, source: &dyn TelemetrySource) -> StepNode {
        let clock = Instant::now();
        let snapshot = collect_snapshot(circuit, source, &self.config).await;
        obs::emit_circuit_collected(&circuit.id, clock.elapsed().as_millis() as u64);

        let ctx = CircuitContext::new(circuit, snapshot);
        evaluate_circuit(&ctx)
    }

    /// Evaluate many devices, at most `max_concurrent_devices` at a time.
    ///
    /// Reports come back in target order, one per target. A device whose run
    /// aborts gets an errored report instead of being dropped.
    pub async fn run_devices(
        &self,
        targets: Vec<DeviceTarget>,
        intent_digest: &str,
    ) -> Vec<ConformanceReport> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_devices.max(1)));
        let mut tasks = Vec::with_capacity(targets.len());

        for target in targets {
            let sem = Arc::clone(&sem);
            let runner = self.clone();
            let digest = intent_digest.to_string();
            let device = target.device.clone();

            let task = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                runner
                    .run_device(&target.device, &target.intent, &digest, target.source)
                    .await
            });
            tasks.push((device, task));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for (device, task) in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(device = %device, error = %e, "device run aborted");
                    reports.push(aborted_report(&device, intent_digest, &e.to_string()));
                }
            }
        }
        reports
    }
}

fn aborted_report(device: &str, intent_digest: &str, error: &str) -> ConformanceReport {
    let now = Utc::now();
    ConformanceReport {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        run_id: Uuid::new_v4(),
        device: device.to_string(),
        intent_digest: intent_digest.to_string(),
        started_at: now,
        finished_at: now,
        root: StepNode::run(device, |_| {
            Err(StepExit::errored(format!("device run aborted: {error}")))
        }),
    }
}

/// Evaluate one circuit: interface, then ICMP, then BGP.
///
/// Every domain runs even when an earlier one fails.
pub fn evaluate_circuit(ctx: &CircuitContext<'_>) -> StepNode {
    let _span = CircuitSpan::enter(&ctx.circuit.id, &ctx.circuit.interface);

    let node = StepNode::run(ctx.label(), |circuit| {
        circuit.attach(validate_interface(ctx));
        circuit.attach(validate_icmp(ctx));
        circuit.attach(validate_bgp(ctx));
        Ok(())
    });

    obs::emit_circuit_evaluated(&ctx.circuit.id, node.verdict().as_str());
    node
}

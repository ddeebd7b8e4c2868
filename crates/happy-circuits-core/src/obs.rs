//! Structured observability hooks for conformance runs.
//!
//! This module provides:
//! - Device-scoped and circuit-scoped tracing spans via RAII guards
//! - Emission functions for run lifecycle events: start, collection,
//!   evaluation, finish
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::info;

use crate::report::VerdictSummary;

/// RAII guard that enters a device run span for its lifetime.
///
/// Only hold it in synchronous code; async code uses `#[instrument]`.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str, device: &str) -> Self {
        let span = tracing::info_span!("happy_circuits.run", run_id = %run_id, device = %device);
        Self {
            _span: span.entered(),
        }
    }
}

/// RAII guard that enters a circuit span for its lifetime.
pub struct CircuitSpan {
    _span: tracing::span::EnteredSpan,
}

impl CircuitSpan {
    pub fn enter(circuit_id: &str, interface: &str) -> Self {
        let span = tracing::info_span!(
            "happy_circuits.circuit",
            circuit = %circuit_id,
            interface = %interface
        );
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: device run started.
pub fn emit_run_started(run_id: &str, device: &str, circuits: usize) {
    info!(event = "run.started", run_id = %run_id, device = %device, circuits = circuits);
}

/// Emit event: telemetry for one circuit collected.
pub fn emit_circuit_collected(circuit_id: &str, duration_ms: u64) {
    info!(event = "circuit.collected", circuit = %circuit_id, duration_ms = duration_ms);
}

/// Emit event: one circuit evaluated.
pub fn emit_circuit_evaluated(circuit_id: &str, verdict: &str) {
    info!(event = "circuit.evaluated", circuit = %circuit_id, verdict = %verdict);
}

/// Emit event: device run finished.
pub fn emit_run_finished(run_id: &str, device: &str, duration_ms: u64, summary: &VerdictSummary) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        device = %device,
        duration_ms = duration_ms,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        errored = summary.errored,
        conforming = summary.is_conforming(),
    );
}

/// Emit event: a telemetry question failed (warning level).
pub fn emit_collection_error(circuit_id: &str, domain: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "telemetry.collect_error",
        circuit = %circuit_id,
        domain = %domain,
        error = %error
    );
}

//! ICMP validator: reachability, success rate, latency and jitter.

use circuit_telemetry::{PingStatistics, RoundTrip};

use super::{check_conform, requested};
use crate::context::CircuitContext;
use crate::error::CheckError;
use crate::step::StepNode;

/// Build the `icmp` subtree for one circuit.
pub fn validate_icmp(ctx: &CircuitContext<'_>) -> StepNode {
    let cid = ctx.circuit.id.as_str();
    let spec = &ctx.circuit.tests.icmp;
    let wanted = spec.test_icmp;
    let address = spec.pingable_address.as_deref().unwrap_or("<undeclared>");

    StepNode::run("icmp", |domain| {
        domain.start_gathering(
            format!("{cid} - INITIATE PING {address} (no fail possible)"),
            |_| {
                requested(wanted, "icmp")?;
                ctx.snapshot.ping.require("ping")?;
                Ok(())
            },
        );

        domain.start(format!("{cid} - VALIDATE RESPONSE"), |step| {
            requested(wanted, "icmp")?;
            let stats = ctx.snapshot.ping_statistics()?;
            step.observe("statistics", summarize(stats));
            Ok(())
        });

        domain.start(format!("{cid} - REPLY COUNT CHECK"), |step| {
            requested(wanted, "icmp")?;
            check_conform(
                step,
                "success_rate_percent",
                spec.success_rate_percent_conform.as_deref(),
                || {
                    ctx.snapshot
                        .ping_statistics()?
                        .success_rate_percent
                        .ok_or_else(|| CheckError::missing("statistics.success_rate_percent"))
                },
            )
        });

        domain.start(format!("{cid} - SINGLE PING LATENCY CHECK"), |step| {
            requested(wanted, "icmp")?;
            check_conform(step, "max_ms", spec.max_ms_conform.as_deref(), || {
                round_trip(ctx)?
                    .max_ms
                    .ok_or_else(|| CheckError::missing("statistics.round_trip.max_ms"))
            })
        });

        domain.start(format!("{cid} - BASIC JITTER TEST"), |step| {
            requested(wanted, "icmp")?;
            check_conform(step, "jitter", spec.jitter_conform.as_deref(), || jitter(ctx))
        });

        Ok(())
    })
}

fn round_trip<'c>(ctx: &'c CircuitContext<'_>) -> Result<&'c RoundTrip, CheckError> {
    ctx.snapshot
        .ping_statistics()?
        .round_trip
        .as_ref()
        .ok_or_else(|| CheckError::missing("statistics.round_trip"))
}

/// Spread between the slowest and fastest reply. A coarse stand-in for
/// jitter, the device reports no per-echo samples.
fn jitter(ctx: &CircuitContext<'_>) -> Result<i64, CheckError> {
    let rtt = round_trip(ctx)?;
    let max = rtt
        .max_ms
        .ok_or_else(|| CheckError::missing("statistics.round_trip.max_ms"))?;
    let min = rtt
        .min_ms
        .ok_or_else(|| CheckError::missing("statistics.round_trip.min_ms"))?;
    max.checked_sub(min).ok_or_else(|| CheckError::OutOfRange {
        field: "statistics.round_trip".to_string(),
        reason: format!("max_ms {max} - min_ms {min} overflows"),
    })
}

fn summarize(stats: &PingStatistics) -> String {
    let show = |v: Option<String>| v.unwrap_or_else(|| "?".to_string());
    format!(
        "sent {} received {} success {}%",
        show(stats.send.map(|v| v.to_string())),
        show(stats.received.map(|v| v.to_string())),
        show(stats.success_rate_percent.map(|v| v.to_string())),
    )
}

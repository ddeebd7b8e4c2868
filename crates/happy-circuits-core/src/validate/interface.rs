//! Interface validator: status, error counters, load, duplex and addressing.
//!
//! Status, error counters and duplex are read from the physical interface
//! (the parent of a sub-interface). Load and IPv4 addressing are read from
//! the circuit's own interface.

use circuit_telemetry::{ErrorCounters, InterfaceCounters};

use super::{check_conform, declared, requested};
use crate::context::CircuitContext;
use crate::error::CheckError;
use crate::extract::load_numerator;
use crate::step::{ensure, StepNode, StepResult, StepScope};

/// Build the `interface` subtree for one circuit.
pub fn validate_interface(ctx: &CircuitContext<'_>) -> StepNode {
    let cid = ctx.circuit.id.as_str();
    let spec = &ctx.circuit.tests.interface;
    let wanted = spec.test_interface;

    StepNode::run("interface", |domain| {
        domain.start_gathering(
            format!("{cid} - Gathering required interface details (no fail possible)"),
            |gather| {
                requested(wanted, "interface")?;
                gather.start(format!("physical interface {}", ctx.snapshot.physical_interface), |_| {
                    ctx.snapshot.physical()?;
                    Ok(())
                });
                gather.start(format!("logical interface {}", ctx.circuit.interface), |_| {
                    ctx.snapshot.logical(&ctx.circuit.interface)?;
                    Ok(())
                });
                Ok(())
            },
        );

        domain.start(format!("{cid} - STATUS CHECK"), |group| {
            group.start("line protocol", |step| {
                requested(wanted, "interface")?;
                let expected = declared(spec.line_protocol.as_deref(), "line_protocol")?;
                let found = physical(ctx)?
                    .line_protocol
                    .as_deref()
                    .ok_or_else(|| CheckError::missing("line_protocol"))?;
                step.observe(expected, found);
                ensure(found.eq_ignore_ascii_case(expected), || {
                    format!("line protocol is {found}, expected {expected}")
                })
            });
            group.start("enabled", |step| {
                requested(wanted, "interface")?;
                let expected = *declared(spec.enabled.as_ref(), "enabled")?;
                let found = physical(ctx)?
                    .enabled
                    .ok_or_else(|| CheckError::missing("enabled"))?;
                step.observe(expected, found);
                ensure(found == expected, || {
                    format!("interface enabled is {found}, expected {expected}")
                })
            });
            Ok(())
        });

        domain.start(format!("{cid} - INPUT ERROR CHECK"), |group| {
            group.start("input errors", |step| {
                requested(wanted, "interface")?;
                check_conform(step, "in_errors", spec.in_errors_conform.as_deref(), || {
                    counter(ctx, "in_errors", |c| c.in_errors)
                })
            });
            group.start("input CRC errors", |step| {
                requested(wanted, "interface")?;
                check_conform(
                    step,
                    "in_crc_errors",
                    spec.in_crc_errors_conform.as_deref(),
                    || counter(ctx, "in_crc_errors", |c| c.in_crc_errors),
                )
            });
            Ok(())
        });

        domain.start(format!("{cid} - OUTBOUND ERROR CHECK"), |group| {
            group.start("output errors", |step| {
                requested(wanted, "interface")?;
                check_conform(step, "out_errors", spec.out_errors_conform.as_deref(), || {
                    counter(ctx, "out_errors", |c| c.out_errors)
                })
            });
            group.start("output collisions", |step| {
                requested(wanted, "interface")?;
                check_conform(
                    step,
                    "out_collision",
                    spec.out_collision_conform.as_deref(),
                    || counter(ctx, "out_collision", |c| c.out_collision),
                )
            });
            Ok(())
        });

        domain.start(format!("{cid} - LOAD TEST"), |group| {
            group.start("tx load", |step| {
                requested(wanted, "interface")?;
                check_conform(step, "txload", spec.txload_conform.as_deref(), || {
                    load(ctx, "txload", |c| c.txload.as_deref())
                })
            });
            group.start("rx load", |step| {
                requested(wanted, "interface")?;
                check_conform(step, "rxload", spec.rxload_conform.as_deref(), || {
                    load(ctx, "rxload", |c| c.rxload.as_deref())
                })
            });
            Ok(())
        });

        domain.start(format!("{cid} - DUPLEX TEST"), |group| {
            group.start("duplex", |step| check_duplex(ctx, step, wanted));
            Ok(())
        });

        domain.start(format!("{cid} - IP ADDRESS CHECK"), |group| {
            group.start("ipv4 address", |step| check_ipv4(ctx, step, wanted));
            Ok(())
        });

        Ok(())
    })
}

fn physical<'c>(ctx: &'c CircuitContext<'_>) -> Result<&'c InterfaceCounters, CheckError> {
    ctx.snapshot.physical()
}

fn logical<'c>(ctx: &'c CircuitContext<'_>) -> Result<&'c InterfaceCounters, CheckError> {
    ctx.snapshot.logical(&ctx.circuit.interface)
}

fn counter(
    ctx: &CircuitContext<'_>,
    field: &str,
    pick: impl FnOnce(&ErrorCounters) -> Option<i64>,
) -> Result<i64, CheckError> {
    let counters = physical(ctx)?
        .counters
        .as_ref()
        .ok_or_else(|| CheckError::missing("counters"))?;
    pick(counters).ok_or_else(|| CheckError::missing(format!("counters.{field}")))
}

fn load(
    ctx: &CircuitContext<'_>,
    field: &str,
    pick: impl FnOnce(&InterfaceCounters) -> Option<&str>,
) -> Result<i64, CheckError> {
    let raw = pick(logical(ctx)?).ok_or_else(|| CheckError::missing(field))?;
    load_numerator(raw)
}

fn check_duplex(ctx: &CircuitContext<'_>, step: &mut StepScope, wanted: bool) -> StepResult {
    requested(wanted, "interface")?;
    let expected = declared(ctx.circuit.tests.interface.duplex.as_deref(), "duplex")?;
    let found = physical(ctx)?
        .duplex_mode
        .as_deref()
        .ok_or_else(|| CheckError::missing("duplex_mode"))?;
    step.observe(expected, found);
    ensure(found.eq_ignore_ascii_case(expected), || {
        format!("duplex is {found}, expected {expected}")
    })
}

fn check_ipv4(ctx: &CircuitContext<'_>, step: &mut StepScope, wanted: bool) -> StepResult {
    requested(wanted, "interface")?;
    let expected = declared(ctx.circuit.tests.interface.ipv4.as_deref(), "ipv4")?;
    let bound = logical(ctx)?
        .ipv4
        .as_ref()
        .ok_or_else(|| CheckError::missing("ipv4"))?;
    let found = bound.keys().cloned().collect::<Vec<_>>().join(", ");
    step.observe(expected, &found);
    ensure(bound.contains_key(expected), || {
        format!("{expected} is not bound to {}, found [{found}]", ctx.circuit.interface)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Collected, TelemetrySnapshot};
    use crate::intent::{Circuit, CircuitTests, InterfaceTestSpec};
    use crate::step::Verdict;
    use circuit_telemetry::Ipv4Binding;
    use std::collections::BTreeMap;

    fn circuit(spec: InterfaceTestSpec) -> Circuit {
        Circuit {
            id: "CIR-7".to_string(),
            interface: "Gi0/1.100".to_string(),
            is_subinterface: true,
            tests: CircuitTests {
                interface: spec,
                icmp: Default::default(),
                bgp: Default::default(),
            },
        }
    }

    fn healthy_parent() -> InterfaceCounters {
        InterfaceCounters {
            duplex_mode: Some("full".to_string()),
            enabled: Some(true),
            line_protocol: Some("up".to_string()),
            counters: Some(ErrorCounters {
                in_errors: Some(2),
                in_crc_errors: Some(0),
                out_errors: Some(0),
                out_collision: Some(0),
            }),
            ..InterfaceCounters::default()
        }
    }

    fn healthy_sub() -> InterfaceCounters {
        let mut ipv4 = BTreeMap::new();
        ipv4.insert("10.0.0.1/30".to_string(), Ipv4Binding::default());
        InterfaceCounters {
            txload: Some("12/255".to_string()),
            rxload: Some("40/255".to_string()),
            ipv4: Some(ipv4),
            ..InterfaceCounters::default()
        }
    }

    fn snapshot(c: &Circuit, parent: InterfaceCounters, sub: InterfaceCounters) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::empty(c);
        snapshot.physical_interface = "Gi0/1".to_string();
        snapshot.physical = Collected::Found(parent);
        snapshot.logical = Collected::Found(sub);
        snapshot
    }

    fn full_spec() -> InterfaceTestSpec {
        InterfaceTestSpec {
            test_interface: true,
            line_protocol: Some("UP".to_string()),
            enabled: Some(true),
            duplex: Some("Full".to_string()),
            ipv4: Some("10.0.0.1/30".to_string()),
            in_errors_conform: Some("le 10".to_string()),
            in_crc_errors_conform: Some("eq 0".to_string()),
            out_errors_conform: Some("eq 0".to_string()),
            out_collision_conform: Some("eq 0".to_string()),
            txload_conform: Some("lt 200".to_string()),
            rxload_conform: Some("lt 200".to_string()),
        }
    }

    #[test]
    fn test_healthy_interface_passes() {
        let c = circuit(full_spec());
        let ctx = CircuitContext::new(&c, snapshot(&c, healthy_parent(), healthy_sub()));

        let node = validate_interface(&ctx);

        for leaf in node.leaves() {
            assert_eq!(leaf.verdict(), Verdict::Passed, "{}", leaf.name());
        }
        assert_eq!(node.verdict(), Verdict::Passed);
    }

    #[test]
    fn test_not_requested_skips_everything() {
        let mut spec = full_spec();
        spec.test_interface = false;
        let c = circuit(spec);
        let ctx = CircuitContext::new(&c, TelemetrySnapshot::empty(&c));

        let node = validate_interface(&ctx);

        assert!(node.leaves().iter().all(|l| l.verdict() == Verdict::Skipped));
        assert_eq!(node.verdict(), Verdict::Skipped);
    }

    #[test]
    fn test_error_counter_over_threshold_fails() {
        let c = circuit(full_spec());
        let mut parent = healthy_parent();
        parent.counters = Some(ErrorCounters {
            in_errors: Some(11),
            ..parent.counters.clone().unwrap_or_default()
        });
        let ctx = CircuitContext::new(&c, snapshot(&c, parent, healthy_sub()));

        let node = validate_interface(&ctx);

        let leaf = node.find("input errors").expect("leaf");
        assert_eq!(leaf.verdict(), Verdict::Failed);
        assert_eq!(leaf.found(), Some("11"));
        assert_eq!(node.verdict(), Verdict::Failed);
    }

    #[test]
    fn test_missing_counter_field_errors() {
        let c = circuit(full_spec());
        let mut parent = healthy_parent();
        parent.counters = Some(ErrorCounters {
            out_collision: None,
            ..parent.counters.clone().unwrap_or_default()
        });
        let ctx = CircuitContext::new(&c, snapshot(&c, parent, healthy_sub()));

        let node = validate_interface(&ctx);

        let leaf = node.find("output collisions").expect("leaf");
        assert_eq!(leaf.verdict(), Verdict::Errored);
        assert!(leaf.reason().unwrap_or_default().contains("out_collision"));
    }

    #[test]
    fn test_undeclared_checks_skip() {
        let spec = InterfaceTestSpec {
            test_interface: true,
            line_protocol: Some("up".to_string()),
            ..InterfaceTestSpec::default()
        };
        let c = circuit(spec);
        let ctx = CircuitContext::new(&c, snapshot(&c, healthy_parent(), healthy_sub()));

        let node = validate_interface(&ctx);

        assert_eq!(node.find("line protocol").map(|l| l.verdict()), Some(Verdict::Passed));
        assert_eq!(node.find("duplex").map(|l| l.verdict()), Some(Verdict::Skipped));
        assert_eq!(node.find("tx load").map(|l| l.verdict()), Some(Verdict::Skipped));
        assert_eq!(node.verdict(), Verdict::Passed);
    }

    #[test]
    fn test_enabled_false_is_compared() {
        let spec = InterfaceTestSpec {
            test_interface: true,
            enabled: Some(false),
            ..InterfaceTestSpec::default()
        };
        let c = circuit(spec);
        let ctx = CircuitContext::new(&c, snapshot(&c, healthy_parent(), healthy_sub()));

        let node = validate_interface(&ctx);

        assert_eq!(node.find("enabled").map(|l| l.verdict()), Some(Verdict::Failed));
    }

    #[test]
    fn test_bad_load_scale_errors() {
        let c = circuit(full_spec());
        let mut sub = healthy_sub();
        sub.rxload = Some("40/100".to_string());
        let ctx = CircuitContext::new(&c, snapshot(&c, healthy_parent(), sub));

        let node = validate_interface(&ctx);

        assert_eq!(node.find("rx load").map(|l| l.verdict()), Some(Verdict::Errored));
        assert_eq!(node.find("tx load").map(|l| l.verdict()), Some(Verdict::Passed));
    }

    #[test]
    fn test_unbound_ipv4_fails() {
        let mut spec = full_spec();
        spec.ipv4 = Some("10.9.9.9/30".to_string());
        let c = circuit(spec);
        let ctx = CircuitContext::new(&c, snapshot(&c, healthy_parent(), healthy_sub()));

        let node = validate_interface(&ctx);

        let leaf = node.find("ipv4 address").expect("leaf");
        assert_eq!(leaf.verdict(), Verdict::Failed);
        assert_eq!(leaf.found(), Some("10.0.0.1/30"));
    }

    #[test]
    fn test_missing_parent_telemetry_is_not_a_gathering_defect() {
        let c = circuit(full_spec());
        let mut snap = snapshot(&c, healthy_parent(), healthy_sub());
        snap.physical = Collected::Missing;
        let ctx = CircuitContext::new(&c, snap);

        let node = validate_interface(&ctx);

        let gather = node.find("Gathering").expect("gathering step");
        assert_eq!(gather.verdict(), Verdict::Passed);
        assert_eq!(gather.children()[0].verdict(), Verdict::Skipped);
        assert_eq!(node.find("line protocol").map(|l| l.verdict()), Some(Verdict::Errored));
        assert_eq!(node.find("tx load").map(|l| l.verdict()), Some(Verdict::Passed));
    }
}

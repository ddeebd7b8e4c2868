//! BGP validator: neighbour uptime and route exchange.

use circuit_telemetry::{AddressFamilyRoutes, BgpNeighborRecord, DEFAULT_ADDRESS_FAMILY};
use tracing::info;

use super::{declared, requested};
use crate::conform::parse_rule;
use crate::context::{CircuitContext, Collected};
use crate::error::CheckError;
use crate::extract::milliseconds_to_days;
use crate::intent::{AddressFamilySpec, NeighborSpec};
use crate::step::{ensure, StepExit, StepNode, StepResult, StepScope};

/// Family name operators use for the default family.
const IPV4_UNICAST: &str = "ipv4 unicast";

/// Map a declared address family to the telemetry key it is looked up under.
///
/// Every family currently resolves to the default family. Families other
/// than `ipv4 unicast` are logged so the collapse is visible.
pub fn resolve_address_family(family: Option<&str>) -> &'static str {
    match family {
        None | Some(IPV4_UNICAST) => {}
        Some(other) => info!(
            address_family = %other,
            "address family not tracked separately, using the default family"
        ),
    }
    DEFAULT_ADDRESS_FAMILY
}

#[derive(Debug, Clone, Copy)]
enum RouteDirection {
    Advertised,
    Received,
}

impl RouteDirection {
    fn label(self) -> &'static str {
        match self {
            RouteDirection::Advertised => "ADVERTISED ROUTES",
            RouteDirection::Received => "RECEIVED ROUTES",
        }
    }

    fn expected(self, spec: &AddressFamilySpec) -> &[String] {
        match self {
            RouteDirection::Advertised => &spec.advertised_routes,
            RouteDirection::Received => &spec.received_routes,
        }
    }

    fn observed(self, routes: &AddressFamilyRoutes) -> &std::collections::BTreeSet<String> {
        match self {
            RouteDirection::Advertised => &routes.advertised,
            RouteDirection::Received => &routes.received,
        }
    }

    /// Key the prefix is stored under. Received routes carry no mask.
    fn key(self, prefix: &str) -> &str {
        match self {
            RouteDirection::Advertised => prefix,
            RouteDirection::Received => prefix.split('/').next().unwrap_or(prefix),
        }
    }
}

/// Build the `bgp` subtree for one circuit.
pub fn validate_bgp(ctx: &CircuitContext<'_>) -> StepNode {
    let cid = ctx.circuit.id.as_str();
    let spec = &ctx.circuit.tests.bgp;
    let wanted = spec.test_bgp;

    StepNode::run("bgp", |domain| {
        if spec.neighbors.is_empty() {
            domain.start(format!("{cid} - BGP NEIGHBORS"), |_| {
                requested(wanted, "bgp")?;
                Err(StepExit::skipped("no neighbors declared"))
            });
            return Ok(());
        }

        for neighbor in &spec.neighbors {
            let ip = neighbor.neighbor_ip.as_str();
            let collected = ctx.snapshot.neighbor(ip);

            domain.start_gathering(
                format!(
                    "{cid} - Gathering BGP details for {ip} in vrf {} (no fail possible)",
                    ctx.snapshot.bgp_vrf
                ),
                |_| {
                    requested(wanted, "bgp")?;
                    neighbor_record(collected, ip)?;
                    Ok(())
                },
            );

            domain.start(format!("{cid} - NEIGHBOR {ip} UPTIME CHECK"), |step| {
                requested(wanted, "bgp")?;
                check_uptime(step, neighbor, collected)
            });

            for direction in [RouteDirection::Advertised, RouteDirection::Received] {
                domain.start(
                    format!("{cid} - NEIGHBOR {ip} {}", direction.label()),
                    |step| {
                        requested(wanted, "bgp")?;
                        check_routes(step, neighbor, collected, direction)
                    },
                );
            }
        }

        Ok(())
    })
}

fn neighbor_record<'c>(
    collected: Option<&'c Collected<BgpNeighborRecord>>,
    ip: &str,
) -> Result<&'c BgpNeighborRecord, CheckError> {
    match collected {
        Some(c) => c.require(&format!("bgp neighbor {ip}")),
        None => Err(CheckError::missing(format!("bgp neighbor {ip}"))),
    }
}

fn check_uptime(
    step: &mut StepScope,
    neighbor: &NeighborSpec,
    collected: Option<&Collected<BgpNeighborRecord>>,
) -> StepResult {
    let ip = neighbor.neighbor_ip.as_str();
    let record = match collected {
        Some(Collected::Failed(reason)) => {
            return Err(StepExit::errored(format!(
                "telemetry for bgp neighbor {ip} unavailable: {reason}"
            )))
        }
        Some(Collected::Found(record)) => record,
        _ => return Err(StepExit::failed(format!("neighbour {ip} is down: no session"))),
    };

    let uptime_ms = match record.session_uptime_ms {
        Some(ms) if ms != 0 => ms,
        _ => {
            return Err(StepExit::failed(format!(
                "neighbour {ip} is down: no session uptime"
            )))
        }
    };

    let expr = declared(neighbor.uptime_conform.as_deref(), "uptime_conform")?;
    let rule = parse_rule(expr)?;
    let days = milliseconds_to_days(uptime_ms as f64);
    step.observe(rule, format!("{days:.2} days"));
    ensure(rule.evaluate_f64(days), || {
        format!("uptime {days:.2} days does not satisfy '{rule}'")
    })
}

fn check_routes(
    step: &mut StepScope,
    neighbor: &NeighborSpec,
    collected: Option<&Collected<BgpNeighborRecord>>,
    direction: RouteDirection,
) -> StepResult {
    if neighbor.address_families.is_empty() {
        return Err(StepExit::skipped("no address families declared"));
    }

    let ip = neighbor.neighbor_ip.as_str();
    for af in &neighbor.address_families {
        let family_name = af.address_family.as_deref().unwrap_or(IPV4_UNICAST);
        step.start(format!("address family {family_name}"), |family_step| {
            let expected = direction.expected(af);
            if expected.is_empty() {
                return Err(StepExit::skipped(format!(
                    "no {} declared",
                    direction.label().to_lowercase()
                )));
            }

            let record = neighbor_record(collected, ip)?;
            let routes = record
                .family(resolve_address_family(af.address_family.as_deref()))
                .map(|routes| direction.observed(routes));

            for prefix in expected {
                let key = direction.key(prefix);
                family_step.start(prefix.as_str(), |leaf| {
                    let present = routes.is_some_and(|set| set.contains(key));
                    leaf.observe("present", if present { "present" } else { "absent" });
                    ensure(present, || {
                        format!("{key} not {} for neighbour {ip}", verb(direction))
                    })
                });
            }
            Ok(())
        });
    }

    Ok(())
}

fn verb(direction: RouteDirection) -> &'static str {
    match direction {
        RouteDirection::Advertised => "advertised to",
        RouteDirection::Received => "received from",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TelemetrySnapshot;
    use crate::intent::{BgpTestSpec, Circuit, CircuitTests};
    use crate::step::Verdict;
    use std::collections::BTreeMap;

    const DAY_MS: i64 = 86_400_000;

    fn circuit(spec: BgpTestSpec) -> Circuit {
        Circuit {
            id: "CIR-3".to_string(),
            interface: "Gi0/3".to_string(),
            is_subinterface: false,
            tests: CircuitTests {
                interface: Default::default(),
                icmp: Default::default(),
                bgp: spec,
            },
        }
    }

    fn neighbor(uptime_conform: Option<&str>, families: Vec<AddressFamilySpec>) -> NeighborSpec {
        NeighborSpec {
            neighbor_ip: "10.0.0.2".to_string(),
            uptime_conform: uptime_conform.map(str::to_string),
            address_families: families,
        }
    }

    fn family(advertised: &[&str], received: &[&str]) -> AddressFamilySpec {
        AddressFamilySpec {
            address_family: Some("ipv4 unicast".to_string()),
            advertised_routes: advertised.iter().map(|s| s.to_string()).collect(),
            received_routes: received.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn session(uptime_ms: Option<i64>) -> BgpNeighborRecord {
        let mut families = BTreeMap::new();
        families.insert(
            DEFAULT_ADDRESS_FAMILY.to_string(),
            AddressFamilyRoutes {
                advertised: ["192.0.2.0/24".to_string()].into_iter().collect(),
                received: ["198.51.100.0".to_string()].into_iter().collect(),
            },
        );
        BgpNeighborRecord {
            session_uptime_ms: uptime_ms,
            address_families: families,
        }
    }

    fn evaluate(spec: BgpTestSpec, record: Collected<BgpNeighborRecord>) -> StepNode {
        let c = circuit(spec);
        let mut snapshot = TelemetrySnapshot::empty(&c);
        snapshot
            .bgp_neighbors
            .insert("10.0.0.2".to_string(), record);
        validate_bgp(&CircuitContext::new(&c, snapshot))
    }

    fn enabled(neighbors: Vec<NeighborSpec>) -> BgpTestSpec {
        BgpTestSpec {
            test_bgp: true,
            vrf: None,
            neighbors,
        }
    }

    fn uptime_verdict(node: &StepNode) -> Option<Verdict> {
        node.find("UPTIME CHECK").map(|s| s.verdict())
    }

    #[test]
    fn test_uptime_boundary() {
        let spec = || enabled(vec![neighbor(Some("ge 30"), vec![])]);

        let thirty = evaluate(spec(), Collected::Found(session(Some(30 * DAY_MS))));
        assert_eq!(uptime_verdict(&thirty), Some(Verdict::Passed));

        let almost = evaluate(spec(), Collected::Found(session(Some(29 * DAY_MS))));
        assert_eq!(uptime_verdict(&almost), Some(Verdict::Failed));
    }

    #[test]
    fn test_missing_uptime_is_failed_not_skipped() {
        let spec = enabled(vec![neighbor(None, vec![])]);

        let no_uptime = evaluate(spec.clone(), Collected::Found(session(None)));
        assert_eq!(uptime_verdict(&no_uptime), Some(Verdict::Failed));

        let zero = evaluate(spec.clone(), Collected::Found(session(Some(0))));
        assert_eq!(uptime_verdict(&zero), Some(Verdict::Failed));

        let absent = evaluate(spec, Collected::Missing);
        assert_eq!(uptime_verdict(&absent), Some(Verdict::Failed));
    }

    #[test]
    fn test_uptime_without_rule_skips_when_up() {
        let spec = enabled(vec![neighbor(None, vec![])]);
        let node = evaluate(spec, Collected::Found(session(Some(DAY_MS))));
        assert_eq!(uptime_verdict(&node), Some(Verdict::Skipped));
    }

    #[test]
    fn test_route_membership() {
        let spec = enabled(vec![neighbor(
            Some("ge 1"),
            vec![family(
                &["192.0.2.0/24", "203.0.113.0/24"],
                &["198.51.100.0/24"],
            )],
        )]);
        let node = evaluate(spec, Collected::Found(session(Some(2 * DAY_MS))));

        assert_eq!(
            node.find("192.0.2.0/24").map(|s| s.verdict()),
            Some(Verdict::Passed)
        );
        assert_eq!(
            node.find("203.0.113.0/24").map(|s| s.verdict()),
            Some(Verdict::Failed)
        );
        let received = node.find("RECEIVED ROUTES").expect("received step");
        assert_eq!(received.verdict(), Verdict::Passed);
        assert_eq!(node.verdict(), Verdict::Failed);
    }

    #[test]
    fn test_non_default_family_resolves_to_default() {
        let mut af = family(&["192.0.2.0/24"], &[]);
        af.address_family = Some("vpnv4 unicast".to_string());
        let spec = enabled(vec![neighbor(None, vec![af])]);
        let node = evaluate(spec, Collected::Found(session(Some(DAY_MS))));

        assert_eq!(
            node.find("192.0.2.0/24").map(|s| s.verdict()),
            Some(Verdict::Passed)
        );
        assert_eq!(resolve_address_family(Some("l2vpn evpn")), DEFAULT_ADDRESS_FAMILY);
        assert_eq!(resolve_address_family(None), DEFAULT_ADDRESS_FAMILY);
    }

    #[test]
    fn test_empty_route_lists_skip() {
        let spec = enabled(vec![neighbor(None, vec![family(&[], &[])])]);
        let node = evaluate(spec, Collected::Found(session(Some(DAY_MS))));

        assert_eq!(
            node.find("ADVERTISED ROUTES").map(|s| s.verdict()),
            Some(Verdict::Skipped)
        );
        assert_eq!(
            node.find("RECEIVED ROUTES").map(|s| s.verdict()),
            Some(Verdict::Skipped)
        );
    }

    #[test]
    fn test_no_neighbors_declared_skips() {
        let node = evaluate(enabled(vec![]), Collected::Missing);
        assert_eq!(node.verdict(), Verdict::Skipped);
        assert_eq!(node.leaves().len(), 1);
    }

    #[test]
    fn test_not_requested_skips_everything() {
        let mut spec = enabled(vec![neighbor(Some("ge 1"), vec![family(&["192.0.2.0/24"], &[])])]);
        spec.test_bgp = false;
        let node = evaluate(spec, Collected::NotRequested);

        assert!(node.leaves().iter().all(|l| l.verdict() == Verdict::Skipped));
        assert_eq!(node.verdict(), Verdict::Skipped);
    }

    #[test]
    fn test_unreachable_neighbor_is_skipped_while_gathering() {
        let spec = enabled(vec![neighbor(Some("ge 1"), vec![])]);
        let node = evaluate(spec, Collected::Failed("empty output".to_string()));

        let gather = node.find("Gathering BGP details").expect("gathering step");
        assert_eq!(gather.verdict(), Verdict::Skipped);
        assert_eq!(uptime_verdict(&node), Some(Verdict::Errored));
    }
}

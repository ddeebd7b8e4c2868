//! End-to-end conformance runs: intent YAML in, report tree out.

use std::sync::Arc;

use circuit_telemetry::fakes::{ScriptedSource, SourceCall};
use circuit_telemetry::{DeviceTelemetry, SnapshotSource, TelemetrySource};
use happy_circuits_core::{
    render_text, CircuitRunner, ConformanceReport, DeviceTarget, IntentDocument, RunnerConfig,
    Verdict,
};
use serde_json::json;

const DAY_MS: i64 = 86_400_000;

const INTENT: &str = r#"
config:
  devices:
    edge-1:
      circuits:
        - circuit: CIR-1001
          interface: GigabitEthernet0/1.100
          is_subinterface: true
          tests:
            interface:
              test_interface: true
              line_protocol: up
              enabled: true
              duplex: full
              ipv4: 10.0.0.1/30
              in_errors_conform: "le 10"
              out_errors_conform: "eq 0"
              txload_conform: "lt 200"
              rxload_conform: "lt 200"
            icmp:
              test_icmp: true
              pingable_address: 10.0.0.2
              success_rate_percent_conform: "ge 80"
              max_ms_conform: "le 20"
              jitter_conform: "le 10"
            bgp:
              test_bgp: true
              neighbors:
                - neighbor_ip: 10.0.0.2
                  uptime_conform: "ge 30"
                  address_families:
                    - address_family: ipv4 unicast
                      advertised_routes: [192.0.2.0/24]
                      received_routes: [198.51.100.0/24]
"#;

fn telemetry(success_rate: i64, uptime_ms: Option<i64>) -> DeviceTelemetry {
    serde_json::from_value(json!({
        "device": "edge-1",
        "interfaces": {
            "GigabitEthernet0/1": {
                "duplex_mode": "full",
                "enabled": true,
                "line_protocol": "up",
                "counters": { "in_errors": 3, "in_crc_errors": 0, "out_errors": 0, "out_collision": 0 }
            },
            "GigabitEthernet0/1.100": {
                "txload": "10/255",
                "rxload": "25/255",
                "ipv4": { "10.0.0.1/30": { "ip": "10.0.0.1", "prefix_length": "30" } }
            }
        },
        "bgp": {
            "default": {
                "10.0.0.2": {
                    "session_uptime_ms": uptime_ms,
                    "address_families": {
                        "": { "advertised": ["192.0.2.0/24"], "received": ["198.51.100.0"] }
                    }
                }
            }
        },
        "pings": [{
            "address": "10.0.0.2",
            "result": { "statistics": {
                "send": 5, "received": 5, "success_rate_percent": success_rate,
                "round_trip": { "min_ms": 1, "avg_ms": 2, "max_ms": 4 }
            } }
        }]
    }))
    .expect("decode telemetry fixture")
}

async fn run(source: Arc<dyn TelemetrySource>) -> ConformanceReport {
    let intent = IntentDocument::from_yaml_str(INTENT).expect("parse intent");
    intent.validate().expect("valid intent");
    let digest = intent.digest().expect("digest");
    let device = intent.device("edge-1").expect("device");

    CircuitRunner::new(RunnerConfig::default())
        .run_device("edge-1", device, &digest, source)
        .await
}

fn verdict(report: &ConformanceReport, needle: &str) -> Verdict {
    report
        .root
        .find(needle)
        .unwrap_or_else(|| panic!("no step matching {needle}"))
        .verdict()
}

#[tokio::test]
async fn test_healthy_circuit_conforms() {
    let source = SnapshotSource::new(telemetry(100, Some(30 * DAY_MS)));
    let report = run(Arc::new(source)).await;

    assert!(report.is_conforming(), "{}", render_text(&report));
    assert_eq!(report.root.verdict(), Verdict::Passed);
    assert_eq!(report.circuits().len(), 1);
    assert_eq!(report.circuits()[0].name(), "CIR-1001-GigabitEthernet0/1.100");
}

#[tokio::test]
async fn test_half_the_echoes_lost_fails_reply_count_only() {
    let source = SnapshotSource::new(telemetry(50, Some(30 * DAY_MS)));
    let report = run(Arc::new(source)).await;

    assert_eq!(verdict(&report, "REPLY COUNT CHECK"), Verdict::Failed);
    assert_eq!(verdict(&report, "SINGLE PING LATENCY CHECK"), Verdict::Passed);
    assert_eq!(verdict(&report, "STATUS CHECK"), Verdict::Passed);
    assert!(!report.is_conforming());
    assert_eq!(report.summary().failed, 1);
}

#[tokio::test]
async fn test_uptime_just_under_threshold_fails() {
    let source = SnapshotSource::new(telemetry(100, Some(29 * DAY_MS)));
    let report = run(Arc::new(source)).await;

    assert_eq!(verdict(&report, "UPTIME CHECK"), Verdict::Failed);
    assert_eq!(verdict(&report, "ADVERTISED ROUTES"), Verdict::Passed);
}

#[tokio::test]
async fn test_session_down_fails_uptime() {
    let source = SnapshotSource::new(telemetry(100, None));
    let report = run(Arc::new(source)).await;

    assert_eq!(verdict(&report, "UPTIME CHECK"), Verdict::Failed);
}

#[tokio::test]
async fn test_subinterface_reads_parent_counters() {
    let source = Arc::new(ScriptedSource::from_telemetry(telemetry(100, Some(DAY_MS * 40))));
    let report = run(source.clone()).await;

    let interface_calls: Vec<_> = source
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            SourceCall::InterfaceCounters(name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(
        interface_calls,
        vec!["GigabitEthernet0/1", "GigabitEthernet0/1.100"]
    );
    assert_eq!(verdict(&report, "input errors"), Verdict::Passed);
}

#[tokio::test]
async fn test_warm_up_ping_precedes_measured_ping() {
    let source = Arc::new(ScriptedSource::from_telemetry(telemetry(100, Some(DAY_MS * 40))));
    run(source.clone()).await;

    let pings = source.ping_requests();
    assert_eq!(pings.len(), 2);
    assert_eq!(pings[0].count, 1);
    assert_eq!(pings[1].count, 5);
    assert!(pings.iter().all(|p| p.vrf.is_none()));
    assert!(pings
        .iter()
        .all(|p| p.source == "GigabitEthernet0/1.100" && p.address == "10.0.0.2"));
}

#[tokio::test]
async fn test_failed_warm_up_is_not_a_defect_but_missing_ping_is() {
    let source = Arc::new(
        ScriptedSource::from_telemetry(telemetry(100, Some(DAY_MS * 40))).fail_ping("10.0.0.2"),
    );
    let report = run(source).await;

    assert_eq!(verdict(&report, "INITIATE PING"), Verdict::Skipped);
    assert_eq!(verdict(&report, "VALIDATE RESPONSE"), Verdict::Errored);
    assert_eq!(verdict(&report, "interface"), Verdict::Passed);
}

#[tokio::test]
async fn test_interface_telemetry_failure_errors_interface_checks_only() {
    let source = Arc::new(
        ScriptedSource::from_telemetry(telemetry(100, Some(DAY_MS * 40)))
            .fail_interface("GigabitEthernet0/1"),
    );
    let report = run(source).await;

    assert_eq!(verdict(&report, "line protocol"), Verdict::Errored);
    assert_eq!(verdict(&report, "tx load"), Verdict::Passed);
    assert_eq!(verdict(&report, "icmp"), Verdict::Passed);
    assert_eq!(verdict(&report, "bgp"), Verdict::Passed);
}

#[tokio::test]
async fn test_nothing_requested_is_all_skipped() {
    let raw = INTENT
        .replace("test_interface: true", "test_interface: false")
        .replace("test_icmp: true", "test_icmp: false")
        .replace("test_bgp: true", "test_bgp: false");
    let intent = IntentDocument::from_yaml_str(&raw).expect("parse intent");
    let source = Arc::new(ScriptedSource::new());

    let report = CircuitRunner::default()
        .run_device(
            "edge-1",
            intent.device("edge-1").expect("device"),
            "digest",
            source.clone(),
        )
        .await;

    assert!(source.calls().is_empty());
    assert!(report
        .root
        .leaves()
        .iter()
        .all(|leaf| leaf.verdict() == Verdict::Skipped));
    assert_eq!(report.root.verdict(), Verdict::Skipped);
    assert!(report.is_conforming());
}

#[tokio::test]
async fn test_malformed_rule_errors_one_check() {
    let raw = INTENT.replace("in_errors_conform: \"le 10\"", "in_errors_conform: \"le10\"");
    let intent = IntentDocument::from_yaml_str(&raw).expect("parse intent");
    let source = SnapshotSource::new(telemetry(100, Some(30 * DAY_MS)));

    let report = CircuitRunner::default()
        .run_device(
            "edge-1",
            intent.device("edge-1").expect("device"),
            "digest",
            Arc::new(source),
        )
        .await;

    assert_eq!(verdict(&report, "input errors"), Verdict::Errored);
    assert_eq!(verdict(&report, "output errors"), Verdict::Passed);
    assert_eq!(report.summary().errored, 1);
}

#[tokio::test]
async fn test_run_devices_returns_reports_in_target_order() {
    let raw = format!(
        "{INTENT}    edge-2:\n      circuits:\n        - circuit: CIR-2001\n          interface: Gi0/0\n          tests:\n            interface: {{ test_interface: false }}\n            icmp: {{ test_icmp: false }}\n            bgp: {{ test_bgp: false }}\n"
    );
    let intent = IntentDocument::from_yaml_str(&raw).expect("parse intent");
    intent.validate().expect("valid intent");

    let targets: Vec<DeviceTarget> = ["edge-2", "edge-1"]
        .iter()
        .map(|name| DeviceTarget {
            device: name.to_string(),
            intent: intent.device(name).expect("device").clone(),
            source: Arc::new(SnapshotSource::new(telemetry(100, Some(30 * DAY_MS)))),
        })
        .collect();

    let runner = CircuitRunner::new(RunnerConfig {
        max_concurrent_devices: 1,
        ..RunnerConfig::default()
    });
    let reports = runner.run_devices(targets, "digest").await;

    let devices: Vec<_> = reports.iter().map(|r| r.device.as_str()).collect();
    assert_eq!(devices, vec!["edge-2", "edge-1"]);
    assert_ne!(reports[0].run_id, reports[1].run_id);
    assert!(reports.iter().all(|r| r.is_conforming()));
}

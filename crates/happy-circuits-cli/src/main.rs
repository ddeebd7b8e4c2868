//! happy-circuits - circuit conformance validation CLI
//!
//! ## Commands
//!
//! - `run`: evaluate devices against their intent using collected telemetry
//! - `validate-intent`: check an intent document without running anything
//! - `render`: print a saved JSON report as a verdict tree

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

use circuit_telemetry::SnapshotSource;
use happy_circuits_core::{
    read_report_json, render_text, write_report_json, CircuitRunner, ConformanceReport,
    DeviceTarget, IntentDocument, RunnerConfig,
};

#[derive(Parser)]
#[command(name = "happy-circuits")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate network circuits against their declared intent", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate devices and print their conformance report
    Run {
        /// Intent document (YAML)
        #[arg(short, long, env = "HAPPY_CIRCUITS_INTENT")]
        intent_file: PathBuf,

        /// Directory holding one `<device>.json` telemetry snapshot per device
        #[arg(short, long, env = "HAPPY_CIRCUITS_TELEMETRY_DIR")]
        telemetry_dir: PathBuf,

        /// Only evaluate these devices (repeatable; default: every device)
        #[arg(short, long = "device")]
        devices: Vec<String>,

        /// Devices evaluated at the same time
        #[arg(long, default_value_t = 4)]
        max_concurrent_devices: usize,

        /// Circuits of one device collected at the same time
        #[arg(long, default_value_t = 8)]
        max_concurrent_circuits: usize,

        /// Echo requests per measured ping when the intent sets no ping_count
        #[arg(long, default_value_t = 5)]
        default_ping_count: u32,

        /// Also write the reports as JSON to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Parse and validate an intent document
    ValidateIntent {
        /// Intent document (YAML)
        #[arg(short, long, env = "HAPPY_CIRCUITS_INTENT")]
        intent_file: PathBuf,
    },

    /// Render a JSON report written by `run --report`
    Render {
        /// Report file
        report: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    happy_circuits_core::init_tracing(cli.json, level);

    let conforming = match cli.command {
        Commands::Run {
            intent_file,
            telemetry_dir,
            devices,
            max_concurrent_devices,
            max_concurrent_circuits,
            default_ping_count,
            report,
        } => {
            let config = RunnerConfig {
                max_concurrent_devices,
                max_concurrent_circuits,
                default_ping_count,
            };
            let reports =
                cmd_run(&intent_file, &telemetry_dir, &devices, config, report.as_deref()).await?;
            for report in &reports {
                print!("{}", render_text(report));
            }
            reports.iter().all(ConformanceReport::is_conforming)
        }
        Commands::ValidateIntent { intent_file } => {
            let summary = cmd_validate_intent(&intent_file)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            true
        }
        Commands::Render { report } => cmd_render(&report)?,
    };

    Ok(if conforming {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_intent(path: &Path) -> Result<IntentDocument> {
    let intent = IntentDocument::load(path)
        .with_context(|| format!("Failed to load intent document {:?}", path))?;
    intent
        .validate()
        .with_context(|| format!("Intent document {:?} is invalid", path))?;
    Ok(intent)
}

/// Devices to evaluate: every device in the intent, or the filter.
fn select_devices(intent: &IntentDocument, filter: &[String]) -> Result<Vec<String>> {
    if filter.is_empty() {
        return Ok(intent.config.devices.keys().cloned().collect());
    }
    for device in filter {
        intent
            .device(device)
            .with_context(|| format!("--device {device} is not in the intent document"))?;
    }
    Ok(filter.to_vec())
}

async fn cmd_run(
    intent_file: &Path,
    telemetry_dir: &Path,
    filter: &[String],
    config: RunnerConfig,
    report_path: Option<&Path>,
) -> Result<Vec<ConformanceReport>> {
    let intent = load_intent(intent_file)?;
    let digest = intent.digest().context("Failed to digest intent document")?;
    let devices = select_devices(&intent, filter)?;

    let mut targets = Vec::with_capacity(devices.len());
    for device in devices {
        let source = SnapshotSource::load_device(telemetry_dir, &device)
            .await
            .with_context(|| format!("Failed to load telemetry for {device}"))?;
        let device_intent = intent.device(&device)?.clone();
        targets.push(DeviceTarget {
            device,
            intent: device_intent,
            source: Arc::new(source),
        });
    }

    info!(devices = targets.len(), digest = %digest, "starting conformance run");
    let reports = CircuitRunner::new(config).run_devices(targets, &digest).await;

    if let Some(path) = report_path {
        write_report_json(path, &reports)?;
        info!(path = ?path, "report written");
    }
    Ok(reports)
}

fn cmd_validate_intent(intent_file: &Path) -> Result<serde_json::Value> {
    let intent = load_intent(intent_file)?;
    let circuits: usize = intent
        .config
        .devices
        .values()
        .map(|d| d.circuits.len())
        .sum();
    Ok(serde_json::json!({
        "valid": true,
        "digest": intent.digest()?,
        "devices": intent.config.devices.len(),
        "circuits": circuits,
    }))
}

fn cmd_render(path: &Path) -> Result<bool> {
    let reports = read_report_json(path)?;
    for report in &reports {
        print!("{}", render_text(report));
    }
    Ok(reports.iter().all(ConformanceReport::is_conforming))
}

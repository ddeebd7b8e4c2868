use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::step::{StepNode, Verdict};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Leaf verdict counts of one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl VerdictSummary {
    pub fn from_tree(root: &StepNode) -> Self {
        let mut summary = VerdictSummary::default();
        for leaf in root.leaves() {
            match leaf.verdict() {
                Verdict::Passed => summary.passed += 1,
                Verdict::Failed => summary.failed += 1,
                Verdict::Skipped => summary.skipped += 1,
                Verdict::Errored => summary.errored += 1,
                Verdict::Pending => {}
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errored
    }

    /// No failed or errored leaves.
    pub fn is_conforming(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

/// Outcome of evaluating every circuit of one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConformanceReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub device: String,
    /// Digest of the intent document the run evaluated.
    pub intent_digest: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Device step; its children are the circuit steps.
    pub root: StepNode,
}

impl ConformanceReport {
    pub fn summary(&self) -> VerdictSummary {
        VerdictSummary::from_tree(&self.root)
    }

    pub fn is_conforming(&self) -> bool {
        self.summary().is_conforming()
    }

    /// Circuit steps, in intent order.
    pub fn circuits(&self) -> &[StepNode] {
        self.root.children()
    }
}

/// Render an indented verdict tree followed by a one-line summary.
pub fn render_text(report: &ConformanceReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "device {} (run {}, intent {})\n",
        report.device,
        report.run_id,
        short_digest(&report.intent_digest)
    ));
    render_node(&report.root, 0, &mut out);

    let summary = report.summary();
    out.push_str(&format!(
        "summary: {} passed, {} failed, {} skipped, {} errored => {}\n",
        summary.passed,
        summary.failed,
        summary.skipped,
        summary.errored,
        if summary.is_conforming() {
            "CONFORMING"
        } else {
            "NOT CONFORMING"
        }
    ));
    out
}

fn render_node(node: &StepNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "[{}] {}",
        node.verdict().as_str().to_uppercase(),
        node.name()
    ));
    if let Some(reason) = node.reason() {
        out.push_str(&format!(" ({reason})"));
    }
    out.push('\n');
    for child in node.children() {
        render_node(child, depth + 1, out);
    }
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

/// Write reports as a pretty JSON array.
pub fn write_report_json(path: &Path, reports: &[ConformanceReport]) -> Result<()> {
    let content = serde_json::to_string_pretty(reports).context("serialize conformance reports")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Read reports written by [`write_report_json`].
pub fn read_report_json(path: &Path) -> Result<Vec<ConformanceReport>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse {:?}", path))
}

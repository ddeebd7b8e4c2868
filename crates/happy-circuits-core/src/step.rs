//! Hierarchical step tree with graded verdicts.
//!
//! A [`StepNode`] is one named unit of evaluation. Its body runs once, may
//! open nested child steps, and exits either normally (implicit pass, unless
//! a child says otherwise) or with a [`StepExit`]. The verdict is frozen when
//! the body returns and the node is never touched again.
//!
//! Aggregation when the body returns `Ok(())`:
//! - any child `failed`  -> `failed`
//! - else any `errored`  -> `errored`
//! - else any `passed`   -> `passed`
//! - else all `skipped`  -> `skipped`
//! - no children         -> `passed`
//!
//! Failures are recorded, never thrown: by default every sibling still runs
//! after one fails. A node can opt into [`StepScope::halt_on_failure`], in
//! which case later children are recorded as `skipped` without running.
//!
//! Gathering steps ([`StepScope::start_gathering`]) collect preconditions and
//! must never report a defect themselves. Any `failed` or `errored` outcome
//! inside one is downgraded to `skipped` on the narrowest step it occurs in.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CheckError;

/// Verdict of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pending,
    Passed,
    Failed,
    Skipped,
    Errored,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pending => "pending",
            Verdict::Passed => "passed",
            Verdict::Failed => "failed",
            Verdict::Skipped => "skipped",
            Verdict::Errored => "errored",
        }
    }

    /// `failed` or `errored`.
    pub fn is_defect(&self) -> bool {
        matches!(self, Verdict::Failed | Verdict::Errored)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Early exit from a step body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepExit {
    /// A declared precondition was not met. Not a defect.
    Skipped(String),
    /// Observed state did not match the expectation.
    Failed(String),
    /// The check could not be evaluated.
    Errored(String),
}

impl StepExit {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepExit::Skipped(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StepExit::Failed(reason.into())
    }

    pub fn errored(reason: impl Into<String>) -> Self {
        StepExit::Errored(reason.into())
    }
}

impl From<CheckError> for StepExit {
    fn from(err: CheckError) -> Self {
        StepExit::Errored(err.to_string())
    }
}

/// What a step body returns.
pub type StepResult = std::result::Result<(), StepExit>;

/// Fail the current step with `reason` unless `condition` holds.
pub fn ensure(condition: bool, reason: impl FnOnce() -> String) -> StepResult {
    if condition {
        Ok(())
    } else {
        Err(StepExit::Failed(reason()))
    }
}

/// A named unit of evaluation and its finalized children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepNode {
    name: String,
    verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    found: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<StepNode>,
    #[serde(skip)]
    gathering: bool,
}

impl StepNode {
    fn pending(name: String, gathering: bool) -> Self {
        Self {
            name,
            verdict: Verdict::Pending,
            reason: None,
            expected: None,
            found: None,
            children: Vec::new(),
            gathering,
        }
    }

    /// Run `body` as a detached step and return it finalized.
    ///
    /// The body builds the step through a [`StepScope`]. Once `run` returns
    /// the node has no way back into that scope:
    ///
    /// ```compile_fail
    /// use happy_circuits_core::{StepExit, StepNode};
    ///
    /// let mut node = StepNode::run("root", |_| Ok(()));
    /// node.start("late", |_| Err(StepExit::failed("bad")));
    /// ```
    pub fn run<F>(name: impl Into<String>, body: F) -> StepNode
    where
        F: FnOnce(&mut StepScope) -> StepResult,
    {
        StepScope::new(name.into(), false).finish(body)
    }

    fn rollup(&self) -> Verdict {
        let any = |v: Verdict| self.children.iter().any(|c| c.verdict == v);
        if self.children.is_empty() {
            Verdict::Passed
        } else if any(Verdict::Failed) {
            Verdict::Failed
        } else if any(Verdict::Errored) {
            Verdict::Errored
        } else if any(Verdict::Passed) {
            Verdict::Passed
        } else {
            Verdict::Skipped
        }
    }

    fn finalize(&mut self, outcome: StepResult) {
        let rolled = self.rollup();
        let (mut verdict, mut reason) = match outcome {
            Ok(()) => (rolled, None),
            Err(StepExit::Skipped(r)) if rolled.is_defect() => (rolled, Some(r)),
            Err(StepExit::Skipped(r)) => (Verdict::Skipped, Some(r)),
            Err(StepExit::Failed(r)) => (Verdict::Failed, Some(r)),
            Err(StepExit::Errored(r)) if rolled == Verdict::Failed => (Verdict::Failed, Some(r)),
            Err(StepExit::Errored(r)) => (Verdict::Errored, Some(r)),
        };

        if self.gathering && verdict.is_defect() {
            reason = Some(match reason {
                Some(r) => format!("gathering problem: {r}"),
                None => "gathering problem in a sub-step".to_string(),
            });
            verdict = Verdict::Skipped;
        }

        self.verdict = verdict;
        self.reason = reason;
        debug!(step = %self.name, verdict = %self.verdict, reason = ?self.reason, "step finalized");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn found(&self) -> Option<&str> {
        self.found.as_deref()
    }

    pub fn children(&self) -> &[StepNode] {
        &self.children
    }

    pub fn is_gathering(&self) -> bool {
        self.gathering
    }

    /// Steps without children, depth-first.
    pub fn leaves(&self) -> Vec<&StepNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a StepNode>) {
        if self.children.is_empty() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    /// First descendant (or self) whose name contains `needle`, depth-first.
    pub fn find(&self, needle: &str) -> Option<&StepNode> {
        if self.name.contains(needle) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(needle))
    }
}

/// A step whose body is still running.
///
/// Children, observations and the halt policy can only be added here. The
/// scope is consumed when the body returns, so a finalized [`StepNode`] is
/// never extended after its verdict is computed.
#[derive(Debug)]
pub struct StepScope {
    node: StepNode,
    continue_on_failure: bool,
}

impl StepScope {
    fn new(name: String, gathering: bool) -> Self {
        Self {
            node: StepNode::pending(name, gathering),
            continue_on_failure: true,
        }
    }

    fn finish<F>(mut self, body: F) -> StepNode
    where
        F: FnOnce(&mut StepScope) -> StepResult,
    {
        let outcome = body(&mut self);
        self.node.finalize(outcome);
        self.node
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Open a child assertion step, run it, and return its verdict.
    pub fn start<F>(&mut self, name: impl Into<String>, body: F) -> Verdict
    where
        F: FnOnce(&mut StepScope) -> StepResult,
    {
        let gathering = self.node.gathering;
        self.open(name.into(), gathering, body)
    }

    /// Open a child gathering step ("no fail possible").
    pub fn start_gathering<F>(&mut self, name: impl Into<String>, body: F) -> Verdict
    where
        F: FnOnce(&mut StepScope) -> StepResult,
    {
        self.open(name.into(), true, body)
    }

    /// Attach a subtree that was evaluated elsewhere.
    pub fn attach(&mut self, child: StepNode) -> Verdict {
        let verdict = child.verdict;
        self.node.children.push(child);
        verdict
    }

    /// Stop running further children of this step once one fails or errors.
    pub fn halt_on_failure(&mut self) {
        self.continue_on_failure = false;
    }

    /// Record and log the expected and observed values of this check.
    pub fn observe(&mut self, expected: impl fmt::Display, found: impl fmt::Display) {
        let expected = expected.to_string();
        let found = found.to_string();
        info!(step = %self.node.name, expected = %expected, found = %found, "observed");
        self.node.expected = Some(expected);
        self.node.found = Some(found);
    }

    fn open<F>(&mut self, name: String, gathering: bool, body: F) -> Verdict
    where
        F: FnOnce(&mut StepScope) -> StepResult,
    {
        let child = StepScope::new(name, gathering);

        let blocked = !self.continue_on_failure
            && self.node.children.iter().any(|c| c.verdict.is_defect());
        let node = if blocked {
            child.finish(|_| Err(StepExit::skipped("blocked: an earlier step failed")))
        } else {
            child.finish(body)
        };

        self.attach(node)
    }
}

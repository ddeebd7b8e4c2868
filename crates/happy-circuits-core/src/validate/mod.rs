//! Domain validators.
//!
//! Each validator turns one circuit's intent and snapshot into a domain
//! subtree (`interface`, `icmp`, `bgp`). Validators are synchronous: all
//! telemetry is collected before they run.

pub mod bgp;
pub mod icmp;
pub mod interface;

pub use bgp::{resolve_address_family, validate_bgp};
pub use icmp::validate_icmp;
pub use interface::validate_interface;

use crate::conform::parse_rule;
use crate::error::CheckError;
use crate::step::{ensure, StepExit, StepResult, StepScope};

/// Skip unless the domain was requested in the intent.
pub(crate) fn requested(flag: bool, domain: &str) -> StepResult {
    if flag {
        Ok(())
    } else {
        Err(StepExit::skipped(format!("{domain} testing not requested")))
    }
}

/// The declared expectation, or a skip naming the missing intent field.
pub(crate) fn declared<'a, T: ?Sized>(value: Option<&'a T>, field: &str) -> Result<&'a T, StepExit> {
    value.ok_or_else(|| StepExit::skipped(format!("{field} not declared")))
}

/// Evaluate an integer observation against an optional conform rule.
///
/// Order matters: an absent rule skips before telemetry is touched, and a
/// malformed rule errors before the observation is read.
pub(crate) fn check_conform<F>(
    step: &mut StepScope,
    field: &str,
    rule: Option<&str>,
    observed: F,
) -> StepResult
where
    F: FnOnce() -> Result<i64, CheckError>,
{
    let expr = declared(rule, &format!("{field}_conform"))?;
    let rule = parse_rule(expr)?;
    let value = observed()?;
    step.observe(rule, value);
    ensure(rule.evaluate(value), || {
        format!("{field} {value} does not satisfy '{rule}'")
    })
}

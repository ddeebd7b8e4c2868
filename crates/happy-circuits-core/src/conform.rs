//! Conform rules: `"<op> <threshold>"` shorthand turned into a predicate.
//!
//! Operators are `le`, `lt`, `ge`, `gt` and `eq` with their arithmetic
//! meaning, observed value on the left: `"le 10"` holds for `observed <= 10`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CheckError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConformOp {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

impl ConformOp {
    pub fn token(&self) -> &'static str {
        match self {
            ConformOp::Le => "le",
            ConformOp::Lt => "lt",
            ConformOp::Ge => "ge",
            ConformOp::Gt => "gt",
            ConformOp::Eq => "eq",
        }
    }

    fn holds<T: PartialOrd>(&self, observed: T, threshold: T) -> bool {
        match self {
            ConformOp::Le => observed <= threshold,
            ConformOp::Lt => observed < threshold,
            ConformOp::Ge => observed >= threshold,
            ConformOp::Gt => observed > threshold,
            ConformOp::Eq => observed == threshold,
        }
    }
}

impl FromStr for ConformOp {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "le" => Ok(ConformOp::Le),
            "lt" => Ok(ConformOp::Lt),
            "ge" => Ok(ConformOp::Ge),
            "gt" => Ok(ConformOp::Gt),
            "eq" => Ok(ConformOp::Eq),
            other => Err(CheckError::UnknownOperator {
                op: other.to_string(),
            }),
        }
    }
}

/// A parsed conform rule. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConformRule {
    op: ConformOp,
    threshold: i64,
}

impl ConformRule {
    pub fn new(op: ConformOp, threshold: i64) -> Self {
        Self { op, threshold }
    }

    pub fn op(&self) -> ConformOp {
        self.op
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Whether `observed` satisfies the rule.
    pub fn evaluate(&self, observed: i64) -> bool {
        self.op.holds(observed, self.threshold)
    }

    /// Fractional variant, threshold widened to `f64`.
    pub fn evaluate_f64(&self, observed: f64) -> bool {
        self.op.holds(observed, self.threshold as f64)
    }
}

impl FromStr for ConformRule {
    type Err = CheckError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = expr.split(' ').collect();
        if tokens.len() != 2 {
            return Err(CheckError::MalformedRule {
                expr: expr.to_string(),
                reason: format!("expected 2 space-separated tokens, found {}", tokens.len()),
            });
        }

        let op: ConformOp = tokens[0].parse()?;
        let threshold = tokens[1]
            .parse::<i64>()
            .map_err(|e| CheckError::MalformedRule {
                expr: expr.to_string(),
                reason: format!("threshold '{}' is not an integer: {}", tokens[1], e),
            })?;

        Ok(ConformRule { op, threshold })
    }
}

impl fmt::Display for ConformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.token(), self.threshold)
    }
}

/// Parse a `"<op> <int>"` expression.
pub fn parse_rule(expr: &str) -> Result<ConformRule, CheckError> {
    expr.parse()
}

/// Evaluate `observed` against `rule`.
pub fn evaluate(observed: i64, rule: &ConformRule) -> bool {
    rule.evaluate(observed)
}

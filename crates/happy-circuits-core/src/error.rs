//! Error taxonomy for the conformance engine.

use circuit_telemetry::TelemetryError;

/// Problems that stop a single check from being evaluated.
///
/// Raised inside a check body, a `CheckError` becomes that check's `errored`
/// verdict. It never aborts the surrounding circuit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("malformed conform rule '{expr}': {reason}")]
    MalformedRule { expr: String, reason: String },

    #[error("unknown operator '{op}', expected one of le, lt, ge, gt, eq")]
    UnknownOperator { op: String },

    #[error("malformed load value '{value}': {reason}")]
    MalformedLoad { value: String, reason: String },

    #[error("malformed sub-interface name '{name}', expected <parent>.<sub id>")]
    MalformedInterfaceName { name: String },

    #[error("telemetry field missing: {field}")]
    MissingTelemetryField { field: String },

    #[error("telemetry for {what} unavailable: {reason}")]
    TelemetryUnavailable { what: String, reason: String },

    #[error("telemetry value out of range for {field}: {reason}")]
    OutOfRange { field: String, reason: String },
}

impl CheckError {
    pub fn missing(field: impl Into<String>) -> Self {
        CheckError::MissingTelemetryField {
            field: field.into(),
        }
    }
}

/// Errors surfaced to the caller before or around an engine run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid intent document: {0}")]
    InvalidIntent(String),

    #[error("device not found in intent document: {0}")]
    UnknownDevice(String),

    #[error("intent parse error: {0}")]
    IntentParse(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_error_display() {
        let err = CheckError::UnknownOperator {
            op: "xx".to_string(),
        };
        assert!(err.to_string().contains("'xx'"));

        let err = CheckError::missing("counters.in_errors");
        assert!(err.to_string().contains("counters.in_errors"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::UnknownDevice("edge-9".to_string());
        assert!(err.to_string().contains("edge-9"));

        let err = EngineError::InvalidIntent("no devices".to_string());
        assert!(err.to_string().contains("invalid intent document"));
    }
}

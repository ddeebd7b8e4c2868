//! Field extractors: raw telemetry fragments to comparable primitives.

use crate::error::CheckError;

/// Scale every device load field is reported against.
pub const LOAD_SCALE: i64 = 255;

/// Numerator of a `"<used>/255"` load string.
pub fn load_numerator(load: &str) -> Result<i64, CheckError> {
    let malformed = |reason: String| CheckError::MalformedLoad {
        value: load.to_string(),
        reason,
    };

    let parts: Vec<&str> = load.split('/').collect();
    if parts.len() != 2 {
        return Err(malformed("expected <used>/<scale>".to_string()));
    }

    let used = parts[0]
        .parse::<i64>()
        .map_err(|_| malformed(format!("'{}' is not an integer", parts[0])))?;
    let scale = parts[1]
        .parse::<i64>()
        .map_err(|_| malformed(format!("'{}' is not an integer", parts[1])))?;
    if scale != LOAD_SCALE {
        return Err(malformed(format!("scale must be {LOAD_SCALE}, found {scale}")));
    }

    Ok(used)
}

/// Parent interface of a `"<parent>.<sub id>"` sub-interface name.
pub fn parent_interface(name: &str) -> Result<String, CheckError> {
    match name.split_once('.') {
        Some((parent, _)) => Ok(parent.to_string()),
        None => Err(CheckError::MalformedInterfaceName {
            name: name.to_string(),
        }),
    }
}

/// Milliseconds to (fractional) days. Zero and negative values pass through.
pub fn milliseconds_to_days(ms: f64) -> f64 {
    let seconds = ms / 1000.0;
    let minutes = seconds / 60.0;
    let hours = minutes / 60.0;
    hours / 24.0
}

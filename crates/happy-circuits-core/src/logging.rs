//! Log output for the `happy-circuits` binary.
//!
//! Logs go to stderr so the rendered report on stdout stays clean.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber, JSON lines when `json` is set.
///
/// `RUST_LOG` overrides `level`. A second call is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let (json_layer, text_layer) = if json {
        let layer = fmt::layer().json().with_writer(std::io::stderr);
        (Some(layer.with_target(false)), None)
    } else {
        let layer = fmt::layer().with_writer(std::io::stderr);
        (None, Some(layer.with_target(false)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}

// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "screener_alerts=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Safe to call when a subscriber is already set (e.g. by the hosting runtime).
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let res = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

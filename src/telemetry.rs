//! Log subscriber setup.
//!
//! `COMPANION_LOG` takes an `EnvFilter` directive (default `warn`).
//! `COMPANION_LOG_FORMAT=json` switches stderr output to JSON lines.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "COMPANION_LOG";
pub const LOG_FORMAT_ENV: &str = "COMPANION_LOG_FORMAT";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    let directive = std::env::var(LOG_ENV).ok();
    let format = std::env::var(LOG_FORMAT_ENV).ok();

    let filter = EnvFilter::try_new(directive.as_deref().unwrap_or(DEFAULT_DIRECTIVE))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if wants_json(format.as_deref()) {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("subscriber already installed");
    }
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

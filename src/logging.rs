//! Tracing initialization shared by both binaries.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g. `ISOMIX_LOG=isomix=debug`.
pub const LOG_ENV: &str = "ISOMIX_LOG";

/// Install the global subscriber. Falls back to `isomix=<default_level>` when
/// `ISOMIX_LOG` is unset or invalid. Safe to call more than once.
pub fn init_tracing(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(format!("isomix={default_level},web={default_level}")));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

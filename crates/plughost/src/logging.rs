//! Tracing setup.
//!
//! Logs always go to stderr: a child-process plugin runtime uses stdout as its channel.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::ENV_LOG;

/// Installs the global subscriber. Safe to call more than once; later calls are no-ops.
///
/// `PLUGHOST_LOG` wins over `default_filter` when set.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("tracing initialized");
    }
}

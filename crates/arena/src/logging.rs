//! Tracing setup for hosts and the demo binary.

use tracing_subscriber::EnvFilter;

use crate::config::ArenaConfig;

/// Install a fmt subscriber writing to stderr. `RUST_LOG` wins over
/// `config.log_level`.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_tracing(config: &ArenaConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FILTER: &str = "NEST_LOG";

/// Install a stderr subscriber. `NEST_LOG` takes standard `EnvFilter`
/// directives; without it the level is `warn`, or `debug` when verbose.
/// Calling this twice is harmless.
pub fn init(verbose: bool) {
    let fallback = if verbose { "nestchat=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_env(ENV_LOG_FILTER).unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

//! Logging setup
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for the
//! report and the final notice.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,kunth=debug"
    } else {
        "warn,kunth=info"
    }
}

/// Initialize the tracing subscriber.
///
/// Priority: `RUST_LOG` env var > `--verbose` > default info level.
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .ok();
}

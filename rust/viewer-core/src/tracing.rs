//! Helpers to wrangle logging across the viewer crates
//! NOTE: [initialize_tracing] should only ever be called in tests or binaries;
//! a library should only concern itself with instrumentation and logging.
use std::sync::Once;

static INITIALIZE_TRACING: Once = Once::new();

const DEFAULT_DIRECTIVES: &str = "viewer_gateway,viewer_worker,viewer_core=info,tower_http=info";

/// Install a global `tracing` subscriber that writes formatted events to
/// stdout. The filter is read from `RUST_LOG` and falls back to
/// `env_filter` (or a sensible default for the viewer crates). Subsequent
/// calls are no-ops.
pub fn initialize_tracing(env_filter: Option<&str>) {
    use tracing_subscriber::prelude::*;
    INITIALIZE_TRACING.call_once(|| {
        let directives = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| env_filter.unwrap_or(DEFAULT_DIRECTIVES).to_owned());

        if let Err(error) = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(directives))
            .with(tracing_subscriber::fmt::layer())
            .try_init()
        {
            eprintln!("Could not initialize tracing: {error}");
        }
    });
}

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "tessel_core=debug,tessel_net=info,tessel_store=info,tessel_node=info,warn";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default
/// filter. Calling this twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

//! Logger setup.

use env_logger::{Builder, Env};

/// Install the global logger. `RUST_LOG` wins over `debug`.
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let _ = Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

//! Logging setup
//!
//! The library only emits `tracing` events; binaries and tests opt in to a
//! subscriber here. `RUST_LOG` overrides the default directive.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "conversion_lab=info";

/// Install a fmt subscriber filtered by `RUST_LOG` or [`DEFAULT_DIRECTIVE`].
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default(DEFAULT_DIRECTIVE)
}

/// Install a fmt subscriber filtered by `RUST_LOG` or `directive`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_default(directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

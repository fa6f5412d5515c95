//! Tracing subscriber setup for hosts embedding the command layer.
//!
//! Commands only emit `tracing` events. Without an installed subscriber
//! those events are dropped, so hosts that already configure tracing never
//! need this module.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "mediator_bus=info,bus_runtime=info";

/// Install a global fmt subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_filter` when `RUST_LOG` is unset or invalid.
/// Returns `false` when a global subscriber was already installed, in which
/// case the existing one is kept.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

//! Structured logging init (spec §9/SPEC_FULL §1.2), trimmed down from
//! the teacher's file-rolling two-layer setup: one stdout layer, driven
//! by `RUST_LOG`, guarded against double-initialization in tests.

use crate::utils::env;
use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initializes the process-wide `tracing` subscriber: a console layer
/// filtered by `RUST_LOG` (default `info`), plus an optional JSON layer
/// when `FLOWCORE_LOG_JSON` is set. Safe to call more than once (tests
/// each call it); only the first call takes effect.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter_spec = env::get_or("RUST_LOG", "info");
        let env_filter = EnvFilter::try_new(&filter_spec).unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(env_filter);

        let init_result = if env::is_enabled("FLOWCORE_LOG_JSON") {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer().with_target(true).with_level(true)).try_init()
        };

        if init_result.is_err() {
            tracing::warn!("logging already initialized, ignoring");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}

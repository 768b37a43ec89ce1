//! Tracing bootstrap for binaries and embedding applications.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured filter
//! - Installing twice is not an error; the first subscriber stays

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Returns false if one was already set.
pub fn init_tracing(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
            eprintln!(
                "invalid log filter `{}` ({}), falling back to `info`",
                config.log_filter, e
            );
            EnvFilter::new("info")
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}


//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries call [`init_logging`]
//! once at startup to install a subscriber.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Installs the global `tracing` subscriber.
///
/// Safe to call more than once; only the first call has any effect. An
/// already-installed global subscriber is left in place.
pub fn init_logging(format: LogFormat) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let installed = match format {
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true))
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("Global tracing subscriber already set, keeping it");
        } else {
            tracing::debug!(?format, "Logging initialized");
        }
    });
}

/// Returns true once [`init_logging`] has run.
#[must_use]
pub fn logging_initialized() -> bool {
    LOGGING_INITIALIZED.get().is_some()
}

// crates.io
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,sim_broker=debug";

/// Installs a JSON log subscriber honoring `RUST_LOG`.
///
/// A second call is a no-op, so tests and binaries can both call it.
pub fn init_logging(service: &str) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
	let installed = tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_target(true))
		.try_init()
		.is_ok();

	if installed {
		tracing::info!(service, "logging initialised");
	}
}

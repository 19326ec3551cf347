use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Log levels are controlled through
/// RUST_LOG; the default is `info`.
pub fn setup_logging() {
	INIT.call_once(|| {
		let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
		tracing_subscriber::registry()
			.with(tracing_subscriber::fmt::layer().with_target(true))
			.with(filter)
			.init();
	});
}

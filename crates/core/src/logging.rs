//! Optional stderr logging for embedders without their own subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn filter_for(verbosity: u8) -> EnvFilter {
	// 0 = errors only, adapter internals silent
	// 1 = info for the application, warn for the adapter
	// 2+ = debug for everything
	let directives = match verbosity {
		0 => "error,cefbind=off,cefbind_runtime=off",
		1 => "info,cefbind=warn,cefbind_runtime=warn",
		_ => "debug",
	};
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Installs a global compact stderr subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging(verbosity: u8) {
	let _ = try_init_logging(verbosity);
}

/// Like [`init_logging`], reporting whether a subscriber was already installed.
pub fn try_init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(filter_for(verbosity))
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.try_init()
}

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Logs go to stderr so stdout stays free for results and the stdio transport.
pub fn init_logging(verbosity: u8) {
	// 0 = warnings only (dropped traffic and failed writes)
	// 1 (-v) = info for the CLI, warn for the bridge internals
	// 2+ (-vv) = debug/trace for everything, including every request
	let filter = match verbosity {
		0 => "warn",
		1 => "info,tether=warn,tether_runtime=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

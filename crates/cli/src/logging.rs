//! Stderr logging for the `wb` binary.

use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count: warnings by default, `-v` info,
/// `-vv` debug, `-vvv` and above trace.
pub fn directive(verbose: u8) -> &'static str {
	match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	}
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_logging(verbose: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(verbose)));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(verbose >= 2)
		.try_init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_maps_to_levels() {
		assert_eq!(directive(0), "warn");
		assert_eq!(directive(1), "info");
		assert_eq!(directive(2), "debug");
		assert_eq!(directive(9), "trace");
	}
}

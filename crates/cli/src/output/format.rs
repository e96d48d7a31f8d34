use clap::ValueEnum;

/// How a command result is written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON envelope (default)
	#[default]
	Json,
	/// The JSON envelope on a single line
	Ndjson,
	/// `key: value` lines for reading in a terminal
	Text,
}

impl OutputFormat {
	pub const fn as_str(self) -> &'static str {
		match self {
			OutputFormat::Json => "json",
			OutputFormat::Ndjson => "ndjson",
			OutputFormat::Text => "text",
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

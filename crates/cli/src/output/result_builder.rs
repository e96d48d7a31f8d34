use std::fmt::Write as _;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::output::format::OutputFormat;
use crate::output::model::{CommandError, CommandResult, Diagnostic, DiagnosticLevel, ErrorCode, SCHEMA_VERSION};

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
	diagnostics: Vec<Diagnostic>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
			diagnostics: Vec::new(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error_with_details(code, message, Value::Null)
	}

	/// A `null` `details` is left out of the envelope.
	pub fn error_with_details(mut self, code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: (!details.is_null()).then_some(details),
		});
		self
	}

	pub fn diagnostic(mut self, level: DiagnosticLevel, message: impl Into<String>) -> Self {
		self.diagnostics.push(Diagnostic {
			level,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.start_time.elapsed().as_millis() as u64),
			diagnostics: self.diagnostics,
		}
	}
}

/// Renders a command result in the specified format.
pub fn render<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) -> String {
	match format {
		OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
		OutputFormat::Ndjson => serde_json::to_string(result).unwrap_or_default(),
		OutputFormat::Text => render_text(result),
	}
}

/// Print a command result to stdout in the specified format.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	println!("{}", render(result, format));
}

fn render_text<T: Serialize>(result: &CommandResult<T>) -> String {
	let mut out = String::new();

	if result.ok {
		if let Some(data) = result.data.as_ref().and_then(|data| serde_json::to_value(data).ok()) {
			write_text_value(&mut out, &data, 0);
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(out, "Error [{}]: {}", error.code, error.message);
		if let Some(ref details) = error.details {
			let _ = writeln!(out, "Details: {details}");
		}
	}

	for diag in &result.diagnostics {
		let prefix = match diag.level {
			DiagnosticLevel::Info => "info",
			DiagnosticLevel::Warning => "warning",
		};
		let _ = writeln!(out, "[{prefix}] {}", diag.message);
	}

	out.trim_end().to_string()
}

/// Objects become `key: value` lines, arrays one item per line.
fn write_text_value(out: &mut String, value: &Value, depth: usize) {
	let indent = "  ".repeat(depth);
	match value {
		Value::Object(map) => {
			for (key, value) in map {
				match value {
					Value::Object(inner) if !inner.is_empty() => {
						let _ = writeln!(out, "{indent}{key}:");
						write_text_value(out, value, depth + 1);
					}
					Value::Array(items) if items.iter().any(|item| item.is_object()) => {
						let _ = writeln!(out, "{indent}{key}:");
						write_text_value(out, value, depth + 1);
					}
					other => {
						let _ = writeln!(out, "{indent}{key}: {}", scalar(other));
					}
				}
			}
		}
		Value::Array(items) => {
			for item in items {
				if item.is_object() {
					let _ = writeln!(out, "{indent}-");
					write_text_value(out, item, depth + 1);
				} else {
					let _ = writeln!(out, "{indent}- {}", scalar(item));
				}
			}
		}
		other => {
			let _ = writeln!(out, "{indent}{}", scalar(other));
		}
	}
}

fn scalar(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

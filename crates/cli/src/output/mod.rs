//! Structured output envelope for client commands.
//!
//! ## Output Contract
//!
//! With `--format json` every command prints one envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "call",
//!   "inputs": { "url": "ws://127.0.0.1:9230", "path": "abc.add", "args": [1, 2] },
//!   "data": 3,
//!   "timings": { "durationMs": 4 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error`:
//!
//! ```json
//! {
//!   "ok": false,
//!   "command": "call",
//!   "error": { "code": "REMOTE_ERROR", "message": "bad item path" }
//! }
//! ```
//!
//! `--format text` prints only the data, or the error on stderr.


use std::io::{self, Write};
use std::time::Instant;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current schema version for command output.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// Pretty-printed JSON envelope
	Json,
	/// Single-line JSON envelope
	Ndjson,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
		}
	}
}

/// The result envelope printed by client commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	/// Whether the command succeeded
	pub ok: bool,

	/// Command name (e.g., "items", "call")
	pub command: String,

	/// Inputs used for this command (for traceability)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub inputs: Option<CommandInputs>,

	/// Command-specific result data (only present on success)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	/// Error information (only present on failure)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

/// Inputs that were used for the command
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandInputs {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub args: Option<Vec<Value>>,
}

/// Error information for failed commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	/// Human-readable error message
	pub message: String,

	/// Additional error details (remote fault, stack trace)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

/// Standardized error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Could not reach the bridge
	ConnectionFailed,
	/// Path or arguments could not be parsed
	InvalidInput,
	/// Property is absent on the host
	NotFound,
	/// The invoked method failed on the host
	RemoteError,
	/// Bridge answered with something unexpected
	ProtocolError,
	/// No response in time
	Timeout,
	/// File or socket I/O error
	IoError,
	/// Unknown/internal error
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::ConnectionFailed => write!(f, "CONNECTION_FAILED"),
			ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
			ErrorCode::NotFound => write!(f, "NOT_FOUND"),
			ErrorCode::RemoteError => write!(f, "REMOTE_ERROR"),
			ErrorCode::ProtocolError => write!(f, "PROTOCOL_ERROR"),
			ErrorCode::Timeout => write!(f, "TIMEOUT"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	/// Total duration in milliseconds
	pub duration_ms: u64,
}

/// Builder for constructing command results
pub struct ResultBuilder<T: Serialize> {
	command: String,
	inputs: Option<CommandInputs>,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	/// Starts timing a result for the given command.
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			inputs: None,
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn inputs(mut self, inputs: CommandInputs) -> Self {
		self.inputs = Some(inputs);
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none();
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok,
			command: self.command,
			inputs: self.inputs,
			data: if ok { self.data } else { None },
			error: self.error,
			timings: Some(Timings {
				duration_ms: self.start_time.elapsed().as_millis() as u64,
			}),
		}
	}
}

/// Print a command result in the requested format
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => {
			if let Some(data) = result.data.as_ref().and_then(|d| serde_json::to_value(d).ok()) {
				let mut stdout = io::stdout().lock();
				let _ = writeln!(stdout, "{}", render_text(&data));
			}
		}
	}
}

/// Text form of a result: bare strings, one line per scalar array entry,
/// pretty JSON for everything else.
pub fn render_text(data: &Value) -> String {
	match data {
		Value::String(s) => s.clone(),
		Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => items
			.iter()
			.map(|item| match item {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			})
			.collect::<Vec<_>>()
			.join("\n"),
		other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
	}
}

/// Print an error for humans on stderr.
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "error".red().bold(), error.code, error.message);
	if let Some(Value::String(stack)) = error.details.as_ref().and_then(|d| d.get("stack")) {
		eprintln!("{}", stack.dimmed());
	}
}

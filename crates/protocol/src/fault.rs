//! Error payloads carried by `call_item_method` responses.
//!
//! A [`Fault`] is what the remote caller sees when a call fails. Structured
//! faults serialize as `{ "message": ..., "stack": ... }`; anything else is
//! forwarded verbatim as a raw JSON value.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message sent when the item path of a call does not resolve to an indexable value.
pub const BAD_ITEM_PATH: &str = "bad item path";

/// Message sent when the called member exists but cannot be invoked.
pub const NOT_A_FUNCTION: &str = "property is not a function";

/// Failure reported by an invoked method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fault {
	/// Structured failure with a message and optional trace.
	Error(ErrorPayload),
	/// Non-structured failure value, passed through unchanged.
	Raw(Value),
}

/// Structured failure details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Human-readable message.
	pub message: String,
	/// Stack trace or cause chain, when the failure carried one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

impl Fault {
	/// Creates a structured fault with no trace.
	pub fn new(message: impl Into<String>) -> Self {
		Fault::Error(ErrorPayload {
			message: message.into(),
			stack: None,
		})
	}

	/// Wraps an arbitrary JSON value that is forwarded as-is.
	pub fn raw(value: impl Into<Value>) -> Self {
		Fault::Raw(value.into())
	}

	/// Attaches a trace. Raw faults are returned unchanged.
	pub fn with_stack(self, stack: impl Into<String>) -> Self {
		match self {
			Fault::Error(mut payload) => {
				payload.stack = Some(stack.into());
				Fault::Error(payload)
			}
			raw => raw,
		}
	}

	pub fn bad_item_path() -> Self {
		Fault::new(BAD_ITEM_PATH)
	}

	pub fn not_a_function() -> Self {
		Fault::new(NOT_A_FUNCTION)
	}

	/// Returns the message of a structured fault.
	pub fn message(&self) -> Option<&str> {
		match self {
			Fault::Error(payload) => Some(&payload.message),
			Fault::Raw(_) => None,
		}
	}

	/// Returns the trace of a structured fault, if present.
	pub fn stack(&self) -> Option<&str> {
		match self {
			Fault::Error(payload) => payload.stack.as_deref(),
			Fault::Raw(_) => None,
		}
	}

	/// Converts into the JSON value placed under `"error"` on the wire.
	pub fn into_value(self) -> Value {
		match self {
			Fault::Error(ErrorPayload { message, stack }) => {
				let mut map = Map::new();
				map.insert("message".to_string(), Value::String(message));
				if let Some(stack) = stack {
					map.insert("stack".to_string(), Value::String(stack));
				}
				Value::Object(map)
			}
			Fault::Raw(value) => value,
		}
	}
}

impl fmt::Display for Fault {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Fault::Error(payload) => f.write_str(&payload.message),
			Fault::Raw(Value::String(s)) => f.write_str(s),
			Fault::Raw(value) => write!(f, "{value}"),
		}
	}
}

/// Any error becomes a structured fault; its `source()` chain becomes the trace.
impl<E: std::error::Error> From<E> for Fault {
	fn from(err: E) -> Self {
		let mut causes = Vec::new();
		let mut source = err.source();
		while let Some(cause) = source {
			causes.push(format!("caused by: {cause}"));
			source = cause.source();
		}

		let fault = Fault::new(err.to_string());
		if causes.is_empty() {
			fault
		} else {
			fault.with_stack(causes.join("\n"))
		}
	}
}

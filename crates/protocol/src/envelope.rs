//! Protocol envelopes and the four bridge operations.
//!
//! Every message on the channel is a JSON object of the form:
//!
//! ```text
//! {
//!   "protocol": "tether/1",
//!   "type": "call_item_method_request",
//!   "id": "7f1c...",
//!   "payload": { "itemPath": ["<identity>", "math"], "propName": "add", "args": [1, 2] }
//! }
//! ```
//!
//! The `protocol` tag lets the bridge share a channel with unrelated traffic:
//! anything without it is rejected by [`Envelope::parse`] and dropped by both
//! peers. The `type` discriminator names the operation and its direction; `id`
//! is the correlation token echoed back on the single response.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::DecodeError;
use crate::fault::Fault;

/// Protocol tag carried by every envelope.
pub const PROTOCOL: &str = "tether/1";

/// Operations a bridge answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Return the static interface descriptor.
	ExposedInterface,
	/// List the identities of all exposed items.
	ExposedItems,
	/// Read a property at an item path.
	FetchItemProperty,
	/// Invoke a method at an item path.
	CallItemMethod,
}

impl Operation {
	pub const ALL: [Operation; 4] = [
		Operation::ExposedInterface,
		Operation::ExposedItems,
		Operation::FetchItemProperty,
		Operation::CallItemMethod,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Operation::ExposedInterface => "exposed_interface",
			Operation::ExposedItems => "exposed_items",
			Operation::FetchItemProperty => "fetch_item_property",
			Operation::CallItemMethod => "call_item_method",
		}
	}

	/// Full discriminator for this operation in the given direction.
	pub fn discriminator(self, direction: Direction) -> String {
		format!("{}_{}", self.as_str(), direction.as_str())
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operation {
	type Err = DecodeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Operation::ALL
			.into_iter()
			.find(|op| op.as_str() == s)
			.ok_or_else(|| DecodeError::UnknownKind(s.to_string()))
	}
}

/// Whether an envelope asks or answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
	Request,
	Response,
}

impl Direction {
	pub fn as_str(self) -> &'static str {
		match self {
			Direction::Request => "request",
			Direction::Response => "response",
		}
	}
}

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Payload of a `fetch_item_property` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRef {
	/// Identity followed by nested member names.
	pub item_path: Vec<String>,
	/// Member read off the value at `item_path`.
	pub prop_name: String,
}

/// Payload of a `call_item_method` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCall {
	/// Identity followed by nested member names; the resolved value is the receiver.
	pub item_path: Vec<String>,
	/// Method name on the receiver.
	pub prop_name: String,
	/// Positional arguments.
	#[serde(default)]
	pub args: Vec<Value>,
}

/// Decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
	ExposedInterface,
	ExposedItems,
	FetchItemProperty(PropertyRef),
	CallItemMethod(MethodCall),
}

impl Request {
	pub fn operation(&self) -> Operation {
		match self {
			Request::ExposedInterface => Operation::ExposedInterface,
			Request::ExposedItems => Operation::ExposedItems,
			Request::FetchItemProperty(_) => Operation::FetchItemProperty,
			Request::CallItemMethod(_) => Operation::CallItemMethod,
		}
	}
}

/// Result of a `call_item_method` request.
///
/// Serializes as `{ "result": value }` or `{ "error": fault }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
	Result(Value),
	Error(Fault),
}

impl CallOutcome {
	pub fn into_value(self) -> Value {
		match self {
			CallOutcome::Result(value) => json!({ "result": value }),
			CallOutcome::Error(fault) => json!({ "error": fault.into_value() }),
		}
	}

	pub fn into_result(self) -> Result<Value, Fault> {
		match self {
			CallOutcome::Result(value) => Ok(value),
			CallOutcome::Error(fault) => Err(fault),
		}
	}
}

impl From<Result<Value, Fault>> for CallOutcome {
	fn from(result: Result<Value, Fault>) -> Self {
		match result {
			Ok(value) => CallOutcome::Result(value),
			Err(fault) => CallOutcome::Error(fault),
		}
	}
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
	/// Descriptor configured on the bridge, verbatim.
	ExposedInterface(Value),
	/// Identities registered at the time of the request.
	ExposedItems(Vec<String>),
	/// Property value, or [`None`] when the path or property is unreachable.
	FetchItemProperty(Option<Value>),
	CallItemMethod(CallOutcome),
}

impl Response {
	pub fn operation(&self) -> Operation {
		match self {
			Response::ExposedInterface(_) => Operation::ExposedInterface,
			Response::ExposedItems(_) => Operation::ExposedItems,
			Response::FetchItemProperty(_) => Operation::FetchItemProperty,
			Response::CallItemMethod(_) => Operation::CallItemMethod,
		}
	}
}

/// Wire envelope shared by requests and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	/// Protocol tag, always [`PROTOCOL`] for envelopes this crate produces.
	pub protocol: String,
	/// `<operation>_<direction>` discriminator.
	#[serde(rename = "type")]
	pub kind: String,
	/// Correlation token.
	pub id: String,
	/// Operation specific body. A present `null` stays `Some(Value::Null)`.
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_present"
	)]
	pub payload: Option<Value>,
}

/// Keeps an explicit `null` distinct from a missing field.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
	D: Deserializer<'de>,
{
	Value::deserialize(deserializer).map(Some)
}

impl Envelope {
	/// Parses text from the channel, rejecting anything not tagged for this protocol.
	pub fn parse(text: &str) -> Result<Self, DecodeError> {
		let value: Value = serde_json::from_str(text)?;
		if value.get("protocol").and_then(Value::as_str) != Some(PROTOCOL) {
			return Err(DecodeError::Foreign);
		}
		Ok(serde_json::from_value(value)?)
	}

	/// Serializes for the channel.
	pub fn to_text(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	/// Splits the discriminator into operation and direction.
	pub fn kind(&self) -> Result<(Operation, Direction), DecodeError> {
		if let Some(op) = self.kind.strip_suffix("_request") {
			Ok((op.parse()?, Direction::Request))
		} else if let Some(op) = self.kind.strip_suffix("_response") {
			Ok((op.parse()?, Direction::Response))
		} else {
			Err(DecodeError::UnknownKind(self.kind.clone()))
		}
	}

	pub fn direction(&self) -> Result<Direction, DecodeError> {
		self.kind().map(|(_, direction)| direction)
	}

	fn new(id: impl Into<String>, operation: Operation, direction: Direction, payload: Option<Value>) -> Self {
		Self {
			protocol: PROTOCOL.to_string(),
			kind: operation.discriminator(direction),
			id: id.into(),
			payload,
		}
	}

	/// Builds a request envelope.
	pub fn request(id: impl Into<String>, request: &Request) -> Self {
		let payload = match request {
			Request::ExposedInterface | Request::ExposedItems => None,
			Request::FetchItemProperty(prop) => Some(json!({
				"itemPath": prop.item_path,
				"propName": prop.prop_name,
			})),
			Request::CallItemMethod(call) => Some(json!({
				"itemPath": call.item_path,
				"propName": call.prop_name,
				"args": call.args,
			})),
		};
		Self::new(id, request.operation(), Direction::Request, payload)
	}

	/// Builds the response envelope answering request `id`.
	pub fn response(id: impl Into<String>, response: Response) -> Self {
		let operation = response.operation();
		let payload = match response {
			Response::ExposedInterface(descriptor) => Some(descriptor),
			Response::ExposedItems(items) => {
				Some(Value::Array(items.into_iter().map(Value::String).collect()))
			}
			Response::FetchItemProperty(value) => value,
			Response::CallItemMethod(outcome) => Some(outcome.into_value()),
		};
		Self::new(id, operation, Direction::Response, payload)
	}

	/// Decodes the body of a request envelope.
	pub fn into_request(self) -> Result<Request, DecodeError> {
		let (operation, direction) = self.kind()?;
		if direction != Direction::Request {
			return Err(DecodeError::Direction {
				expected: Direction::Request,
				found: direction,
			});
		}

		Ok(match operation {
			Operation::ExposedInterface => Request::ExposedInterface,
			Operation::ExposedItems => Request::ExposedItems,
			Operation::FetchItemProperty => {
				let payload = self.payload.ok_or(DecodeError::MissingPayload(operation))?;
				Request::FetchItemProperty(serde_json::from_value(payload)?)
			}
			Operation::CallItemMethod => {
				let payload = self.payload.ok_or(DecodeError::MissingPayload(operation))?;
				Request::CallItemMethod(serde_json::from_value(payload)?)
			}
		})
	}

	/// Decodes the body of a response envelope.
	pub fn into_response(self) -> Result<Response, DecodeError> {
		let (operation, direction) = self.kind()?;
		if direction != Direction::Response {
			return Err(DecodeError::Direction {
				expected: Direction::Response,
				found: direction,
			});
		}

		Ok(match operation {
			Operation::ExposedInterface => {
				Response::ExposedInterface(self.payload.unwrap_or(Value::Null))
			}
			Operation::ExposedItems => {
				let payload = self.payload.ok_or(DecodeError::MissingPayload(operation))?;
				Response::ExposedItems(serde_json::from_value(payload)?)
			}
			Operation::FetchItemProperty => Response::FetchItemProperty(self.payload),
			Operation::CallItemMethod => {
				let payload = self.payload.ok_or(DecodeError::MissingPayload(operation))?;
				Response::CallItemMethod(serde_json::from_value(payload)?)
			}
		})
	}
}

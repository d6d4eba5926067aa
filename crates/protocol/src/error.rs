//! Envelope decoding errors.

use thiserror::Error;

use crate::envelope::{Direction, Operation};

/// Why an inbound message could not be turned into a request or response.
///
/// Dispatchers treat every variant as "not for us" and drop the message;
/// the distinction only matters for logging.
#[derive(Debug, Error)]
pub enum DecodeError {
	/// The text is not valid JSON or does not match the envelope shape.
	#[error("malformed envelope: {0}")]
	Json(#[from] serde_json::Error),

	/// Valid JSON that is not tagged for this protocol.
	#[error("message does not belong to this protocol")]
	Foreign,

	/// Discriminator is not one of the known operations.
	#[error("unknown message type: {0}")]
	UnknownKind(String),

	/// A request arrived where a response was expected, or vice versa.
	#[error("expected a {expected} envelope, got a {found}")]
	Direction {
		expected: Direction,
		found: Direction,
	},

	/// Operation requires a payload but none was sent.
	#[error("{0} envelope is missing its payload")]
	MissingPayload(Operation),
}

//! Error types for the tether runtime.

use tether_protocol::{DecodeError, Fault};
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tether runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Failed to establish a connection to the peer.
	#[error("Failed to connect: {0}")]
	ConnectionFailed(String),

	/// Transport-level error (framing, socket, pipe).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Peer sent something that violates the protocol.
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// Envelope could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// Remote method call failed on the host.
	#[error("Remote call failed: {0}")]
	Remote(Fault),

	/// Frame length exceeds the configured maximum.
	#[error("Frame of {len} bytes exceeds the {max} byte limit")]
	FrameTooLarge { len: usize, max: usize },

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Timeout waiting for a response.
	#[error("Timeout: {0}")]
	Timeout(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// `run()` was called on an endpoint whose message loop already started.
	#[error("Message loop already running")]
	AlreadyRunning,

	/// Invalid argument provided by the caller.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}

impl Error {
	/// Returns the remote fault if this is a Remote error.
	pub fn fault(&self) -> Option<&Fault> {
		match self {
			Error::Remote(fault) => Some(fault),
			_ => None,
		}
	}

	/// Returns the stack trace if this is a Remote error with a stack.
	pub fn stack_trace(&self) -> Option<&str> {
		self.fault().and_then(Fault::stack)
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::TransportError(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_error_exposes_fault() {
		let err = Error::Remote(Fault::new("boom").with_stack("trace"));
		assert_eq!(err.to_string(), "Remote call failed: boom");
		assert_eq!(err.stack_trace(), Some("trace"));
		assert!(!err.is_timeout());
	}

	#[test]
	fn timeout_is_classified() {
		assert!(Error::Timeout("call".into()).is_timeout());
		assert!(Error::ChannelClosed.fault().is_none());
	}
}

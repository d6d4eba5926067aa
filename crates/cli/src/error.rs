use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid path {path:?}: {reason}")]
	InvalidPath { path: String, reason: &'static str },

	#[error("invalid url {url:?}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("nothing at {0}")]
	NotFound(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Bridge(#[from] tether::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::InvalidPath { .. } | CliError::InvalidUrl { .. } => (ErrorCode::InvalidInput, None),
			CliError::NotFound(_) => (ErrorCode::NotFound, None),
			CliError::Io(_) => (ErrorCode::IoError, None),
			CliError::Json(_) => (ErrorCode::InvalidInput, None),
			CliError::Bridge(err) => bridge_error_code(err),
			CliError::Anyhow(err) => match err.downcast_ref::<tether::Error>() {
				Some(err) => bridge_error_code(err),
				None => (ErrorCode::InternalError, None),
			},
		};

		CommandError {
			code,
			message: self.message(),
			details,
		}
	}

	/// Message without the remote fault's stack, which goes into details.
	fn message(&self) -> String {
		match self {
			CliError::Bridge(tether::Error::Remote(fault)) => fault.to_string(),
			CliError::Anyhow(err) => format!("{err:#}"),
			other => other.to_string(),
		}
	}
}

fn bridge_error_code(err: &tether::Error) -> (ErrorCode, Option<serde_json::Value>) {
	use tether::Error;

	match err {
		Error::Remote(fault) => (ErrorCode::RemoteError, Some(fault.clone().into_value())),
		Error::Timeout(_) => (ErrorCode::Timeout, None),
		Error::ConnectionFailed(_) | Error::TransportError(_) | Error::ChannelClosed => {
			(ErrorCode::ConnectionFailed, None)
		}
		Error::ProtocolError(_) | Error::Decode(_) | Error::FrameTooLarge { .. } => {
			(ErrorCode::ProtocolError, None)
		}
		Error::Io(_) => (ErrorCode::IoError, None),
		Error::Json(_) | Error::InvalidArgument(_) => (ErrorCode::InvalidInput, None),
		Error::AlreadyRunning => (ErrorCode::InternalError, None),
	}
}

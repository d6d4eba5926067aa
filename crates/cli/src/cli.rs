use std::net::SocketAddr;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Default address `serve` listens on.
pub const DEFAULT_ADDR: &str = "127.0.0.1:9230";

/// Default bridge client commands connect to.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:9230";

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Expose objects over a tether bridge, or talk to one")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default), json, or ndjson
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Bridge to connect to (client commands)
	#[arg(long, global = true, value_name = "URL", default_value = DEFAULT_URL)]
	pub connect: String,

	/// Milliseconds to wait for each response (client commands)
	#[arg(long, global = true, value_name = "MS", default_value_t = 10_000)]
	pub timeout: u64,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Host the demo objects until interrupted
	Serve {
		/// Address to accept WebSocket connections on
		#[arg(long, value_name = "ADDR", default_value = DEFAULT_ADDR, conflicts_with = "stdio")]
		listen: SocketAddr,

		/// Speak the protocol over stdin/stdout with length-prefixed frames
		#[arg(long)]
		stdio: bool,
	},

	/// Print the interface descriptor offered by the bridge
	Describe,

	/// List the identities of exposed items
	Items,

	/// Read a property: <identity>.<member>...<prop>
	Fetch {
		/// Dotted path; the last segment is the property
		path: String,
	},

	/// Call a method: <identity>.<member>...<method> [ARGS]...
	Call {
		/// Dotted path; the last segment is the method
		path: String,

		/// Arguments, parsed as JSON where possible and as plain strings otherwise
		#[arg(allow_hyphen_values = true)]
		args: Vec<String>,
	},
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Serve { .. } => "serve",
			Commands::Describe => "describe",
			Commands::Items => "items",
			Commands::Fetch { .. } => "fetch",
			Commands::Call { .. } => "call",
		}
	}
}

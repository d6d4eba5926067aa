mod call;
mod describe;
mod fetch;
mod items;
mod serve;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tether::Connection;
use tether::transport::websocket;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use crate::output::{self, CommandInputs, OutputFormat, ResultBuilder};
use crate::path::{MemberPath, parse_arg};

/// Client command with its member path already validated.
enum ClientCommand {
	Describe,
	Items,
	Fetch(MemberPath),
	Call(MemberPath, Vec<Value>),
}

pub async fn dispatch(cli: Cli) -> Result<()> {
	let Cli {
		format,
		connect,
		timeout,
		command,
		..
	} = cli;

	let name = command.name();
	let mut inputs = CommandInputs {
		url: Some(connect.clone()),
		..Default::default()
	};

	// Bad paths fail before any connection is made.
	let client = match command {
		Commands::Serve { listen, stdio } => return serve::execute(listen, stdio).await,
		Commands::Describe => Ok(ClientCommand::Describe),
		Commands::Items => Ok(ClientCommand::Items),
		Commands::Fetch { path } => {
			inputs.path = Some(path.clone());
			MemberPath::parse(&path).map(ClientCommand::Fetch)
		}
		Commands::Call { path, args } => {
			let args: Vec<Value> = args.iter().map(|arg| parse_arg(arg)).collect();
			inputs.path = Some(path.clone());
			inputs.args = Some(args.clone());
			MemberPath::parse(&path).map(|path| ClientCommand::Call(path, args))
		}
	};

	let builder = ResultBuilder::<Value>::new(name).inputs(inputs);
	let result = match client {
		Ok(client) => run_client(&connect, Duration::from_millis(timeout), client).await,
		Err(err) => Err(err),
	};
	finish(builder, result, format)
}

async fn run_client(url: &str, timeout: Duration, command: ClientCommand) -> Result<Value> {
	let connection = connect(url, timeout).await?;
	match command {
		ClientCommand::Describe => describe::execute(&connection).await,
		ClientCommand::Items => items::execute(&connection).await,
		ClientCommand::Fetch(path) => fetch::execute(&connection, path).await,
		ClientCommand::Call(path, args) => call::execute(&connection, path, args).await,
	}
}

fn finish(builder: ResultBuilder<Value>, result: Result<Value>, format: OutputFormat) -> Result<()> {
	match result {
		Ok(data) => {
			output::print_result(&builder.data(data).build(), format);
			Ok(())
		}
		Err(err) => {
			// Text mode reports on stderr only; see main.
			if format != OutputFormat::Text {
				output::print_result(&builder.error(err.to_command_error()).build(), format);
			}
			Err(err)
		}
	}
}

/// Opens a client connection and starts its message loop.
async fn connect(url: &str, timeout: Duration) -> Result<Arc<Connection>> {
	let parsed = url::Url::parse(url).map_err(|source| CliError::InvalidUrl {
		url: url.to_string(),
		source,
	})?;
	if !matches!(parsed.scheme(), "ws" | "wss") {
		return Err(anyhow::anyhow!("unsupported scheme {:?}; expected ws or wss", parsed.scheme()).into());
	}

	let parts = websocket::connect(parsed.as_str())
		.await
		.with_context(|| format!("could not reach bridge at {url}"))?;
	let connection = Arc::new(Connection::new(parts).with_request_timeout(timeout));

	let runner = Arc::clone(&connection);
	tokio::spawn(async move {
		if let Err(e) = runner.run().await {
			tracing::warn!("Connection loop ended: {}", e);
		}
	});

	tracing::info!(url, "Connected");
	Ok(connection)
}

use clap::Parser;
use tether_cli::{cli::Cli, commands, logging, output};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		// Always print to stderr for humans; json formats already got the envelope on stdout.
		output::print_error_stderr(&err.to_command_error());
		std::process::exit(1);
	}
}

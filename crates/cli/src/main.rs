use clap::Parser;
use wb_cli::cli::Cli;
use wb_cli::context::CommandContext;
use wb_cli::output::{ResultBuilder, print_result};
use wb_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let command_name = cli.command.name();
	let ctx = CommandContext::new(cli.config, cli.storage);
	let result = match commands::dispatch(cli.command, &ctx).await {
		Ok(data) => ResultBuilder::new(command_name).data(data).build(),
		Err(err) => {
			tracing::debug!(target = "wb", error = %err, "command failed");
			ResultBuilder::new(command_name).error_with_details(err.code(), err.to_string(), err.details()).build()
		}
	};

	print_result(&result, cli.format);
	if !result.ok {
		std::process::exit(1);
	}
}

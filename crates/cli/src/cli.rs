use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wb")]
#[command(about = "Wallet bridge - inspect stored connections and simulate page requests")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// Config file (defaults to $XDG_CONFIG_HOME/wb/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Storage file holding connection records (defaults to $XDG_CONFIG_HOME/wb/storage.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub storage: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List request kinds and their response kinds
	Kinds,

	/// Inspect or edit stored connection records
	Store {
		#[command(subcommand)]
		action: StoreAction,
	},

	/// Run one provider method through page, relay and background in-process
	#[command(alias = "sim")]
	Simulate {
		/// Provider method, e.g. eth_requestAccounts
		method: String,

		/// JSON array of method params
		#[arg(short, long, default_value = "[]")]
		params: String,

		/// Host of the simulated page
		#[arg(long, default_value = "app.example")]
		origin: String,

		/// Account the simulated popup approves with
		#[arg(long, default_value = "0x0000000000000000000000000000000000000001")]
		address: String,

		/// Chain the simulated popup approves with
		#[arg(long)]
		chain_id: Option<u64>,

		/// Reject every popup prompt instead of approving
		#[arg(long)]
		reject: bool,

		/// Keep the store in memory instead of writing the storage file
		#[arg(long)]
		ephemeral: bool,

		/// Give up waiting for an answer after this many milliseconds
		#[arg(long, default_value = "5000")]
		timeout_ms: u64,
	},

	/// Show the effective configuration
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand, Debug)]
pub enum StoreAction {
	/// List every stored origin
	List,
	/// Show the record of one origin
	Show { origin: String },
	/// Remove the record of one origin
	Forget { origin: String },
	/// Remove every record
	Clear,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
	/// Print the configuration with defaults filled in
	Show,
}

impl Commands {
	/// Dotted name reported in the result envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Kinds => "kinds",
			Commands::Store { action } => match action {
				StoreAction::List => "store.list",
				StoreAction::Show { .. } => "store.show",
				StoreAction::Forget { .. } => "store.forget",
				StoreAction::Clear => "store.clear",
			},
			Commands::Simulate { .. } => "simulate",
			Commands::Config { action: ConfigAction::Show } => "config.show",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from(["wb", "store", "show", "app.example", "-f", "text", "-vv"]).unwrap();
		assert_eq!(cli.format, OutputFormat::Text);
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.command.name(), "store.show");
	}

	#[test]
	fn simulate_defaults() {
		let cli = Cli::try_parse_from(["wb", "sim", "eth_chainId"]).unwrap();
		match cli.command {
			Commands::Simulate {
				method,
				params,
				origin,
				reject,
				ephemeral,
				..
			} => {
				assert_eq!(method, "eth_chainId");
				assert_eq!(params, "[]");
				assert_eq!(origin, "app.example");
				assert!(!reject);
				assert!(!ephemeral);
			}
			other => panic!("unexpected command {other:?}"),
		}
	}
}

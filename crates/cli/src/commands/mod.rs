mod config;
mod kinds;
mod simulate;
mod store;

use serde_json::Value;

use crate::cli::{Commands, ConfigAction, StoreAction};
use crate::context::CommandContext;
use crate::error::Result;

pub use simulate::SimulateOptions;

pub async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<Value> {
	match command {
		Commands::Kinds => Ok(kinds::execute()),
		Commands::Store { action } => match action {
			StoreAction::List => store::list(ctx).await,
			StoreAction::Show { origin } => store::show(ctx, &origin).await,
			StoreAction::Forget { origin } => store::forget(ctx, &origin).await,
			StoreAction::Clear => store::clear(ctx).await,
		},
		Commands::Simulate {
			method,
			params,
			origin,
			address,
			chain_id,
			reject,
			ephemeral,
			timeout_ms,
		} => {
			simulate::execute(
				ctx,
				SimulateOptions {
					method,
					params,
					origin,
					address,
					chain_id,
					reject,
					ephemeral,
					timeout_ms,
				},
			)
			.await
		}
		Commands::Config { action: ConfigAction::Show } => config::show(ctx),
	}
}

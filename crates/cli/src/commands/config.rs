use serde_json::{Value, json};

use crate::context::CommandContext;
use crate::error::Result;

pub fn show(ctx: &CommandContext) -> Result<Value> {
	let config = ctx.config()?;
	Ok(json!({
		"path": ctx.config_path(),
		"exists": ctx.config_path().exists(),
		"storage": ctx.storage_path(),
		"config": config,
	}))
}

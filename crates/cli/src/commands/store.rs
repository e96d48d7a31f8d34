use serde_json::{Value, json};
use wb::protocol::normalize_host;

use crate::context::CommandContext;
use crate::error::{CliError, Result};

pub async fn list(ctx: &CommandContext) -> Result<Value> {
	let records = ctx.store().list().await?;
	Ok(json!({
		"storage": ctx.storage_path(),
		"origins": records,
	}))
}

pub async fn show(ctx: &CommandContext, origin: &str) -> Result<Value> {
	let origin = normalize_host(origin);
	let record = ctx.store().get(&origin).await?.ok_or_else(|| CliError::NotFound(origin.clone()))?;
	Ok(json!({
		"origin": origin,
		"connected": record.is_connected(),
		"record": record,
	}))
}

pub async fn forget(ctx: &CommandContext, origin: &str) -> Result<Value> {
	let origin = normalize_host(origin);
	let removed = ctx.store().remove(&origin).await?;
	tracing::info!(target = "wb.store", %origin, removed, "forget");
	Ok(json!({ "origin": origin, "removed": removed }))
}

pub async fn clear(ctx: &CommandContext) -> Result<Value> {
	let removed = ctx.store().clear().await?;
	tracing::info!(target = "wb.store", count = removed.len(), "cleared");
	Ok(json!({ "removed": removed }))
}

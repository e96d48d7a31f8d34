//! Answers that need no popup.

use serde_json::{Map, Value, json};
use wb_protocol::{ConnectionRecord, ExternalKind, ResponseEnvelope, WalletError};

/// Answers `kind` from the stored record alone, or returns `None` when the
/// request needs the popup.
///
/// | kind                 | answered when                         |
/// |----------------------|---------------------------------------|
/// | `account`            | always (error when no record)         |
/// | `chainId`            | always (default chain when no record) |
/// | `requestPermissions` | accounts, chain and permissions known |
/// | `selectAccount`      | accounts and chain known              |
pub fn short_circuit(kind: ExternalKind, record: Option<&ConnectionRecord>, default_chain_id: u64) -> Option<ResponseEnvelope> {
	let response_kind = kind.response_kind();
	match kind {
		ExternalKind::Account => Some(match record.filter(|r| r.is_connected()) {
			Some(record) => ResponseEnvelope::success(response_kind, account_payload(record)),
			None => ResponseEnvelope::failure(response_kind, WalletError::NotConnected.message()),
		}),
		ExternalKind::ChainId => {
			let mut payload = Map::new();
			payload.insert("chainId".into(), json!(record.and_then(|r| r.chain_id).unwrap_or(default_chain_id)));
			if let Some(address) = record.and_then(ConnectionRecord::primary_account) {
				payload.insert("address".into(), json!(address));
			}
			Some(ResponseEnvelope::success(response_kind, Value::Object(payload)))
		}
		ExternalKind::RequestPermissions => {
			let record = record.filter(|r| r.has_permissions())?;
			let mut payload = account_payload(record);
			payload["permissions"] = json!(record.permissions);
			Some(ResponseEnvelope::success(response_kind, payload))
		}
		ExternalKind::SelectAccount => {
			let record = record.filter(|r| r.is_connected())?;
			Some(ResponseEnvelope::success(response_kind, account_payload(record)))
		}
		_ => None,
	}
}

fn account_payload(record: &ConnectionRecord) -> Value {
	json!({
		"address": record.primary_account(),
		"chainId": record.chain_id,
	})
}

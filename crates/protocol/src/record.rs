//! Persisted per-origin authorization records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only capability a page may request.
pub const ETH_ACCOUNTS_CAPABILITY: &str = "eth_accounts";

/// EIP-2255 permission granted to an origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
	pub parent_capability: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub invoker: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub caveats: Vec<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date: Option<u64>,
}

/// Authorization a user granted to one origin.
///
/// ```json
/// { "accounts": ["0xabc"], "chainId": 1, "permissions": [...], "timestamp": 1700000000000 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
	#[serde(default)]
	pub accounts: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chain_id: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permissions: Option<Vec<Permission>>,
	/// Milliseconds since the Unix epoch of the last merge.
	#[serde(default)]
	pub timestamp: u64,
}

impl ConnectionRecord {
	pub fn primary_account(&self) -> Option<&str> {
		self.accounts.first().map(String::as_str)
	}

	/// Accounts and chain are both on record.
	pub fn is_connected(&self) -> bool {
		!self.accounts.is_empty() && self.chain_id.is_some()
	}

	pub fn has_permissions(&self) -> bool {
		self.is_connected() && self.permissions.as_ref().is_some_and(|p| !p.is_empty())
	}

	/// Overwrites fields present in `update`, keeps the rest, refreshes the timestamp.
	pub fn merge(&mut self, update: ConnectionUpdate, now_ms: u64) {
		if let Some(accounts) = update.accounts {
			self.accounts = accounts;
		}
		if let Some(chain_id) = update.chain_id {
			self.chain_id = Some(chain_id);
		}
		if let Some(permissions) = update.permissions {
			self.permissions = Some(permissions);
		}
		self.timestamp = now_ms;
	}
}

/// Partial record extracted from a successful response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionUpdate {
	pub accounts: Option<Vec<String>>,
	pub chain_id: Option<u64>,
	pub permissions: Option<Vec<Permission>>,
}

impl ConnectionUpdate {
	/// Builds an update from a response payload that carries an `address`.
	///
	/// Returns `None` when the payload has no address; such responses are
	/// never persisted.
	pub fn from_payload(payload: &Value) -> Option<Self> {
		let address = payload.get("address")?.as_str()?;
		if address.is_empty() {
			return None;
		}
		let permissions = payload
			.get("permissions")
			.and_then(|value| serde_json::from_value::<Vec<Permission>>(value.clone()).ok());
		Some(Self {
			accounts: Some(vec![address.to_string()]),
			chain_id: payload.get("chainId").and_then(parse_chain_id),
			permissions,
		})
	}
}

/// Accepts a chain id as a JSON number, a decimal string or a `0x` hex string.
pub fn parse_chain_id(value: &Value) -> Option<u64> {
	match value {
		Value::Number(n) => n.as_u64(),
		Value::String(s) => {
			let s = s.trim();
			match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
				Some(hex) => u64::from_str_radix(hex, 16).ok(),
				None => s.parse().ok(),
			}
		}
		_ => None,
	}
}

/// Formats a chain id the way EIP-1193 reports it.
pub fn chain_id_hex(chain_id: u64) -> String {
	format!("{chain_id:#x}")
}

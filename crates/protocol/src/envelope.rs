//! Request and response envelopes crossing context boundaries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::{ExternalKind, RequestKind, ResponseKind};

/// A wallet request as it travels from page to background.
///
/// ```json
/// { "kind": "accountRequest", "params": [], "originHost": "app.example" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
	pub kind: RequestKind,
	#[serde(default)]
	pub params: Vec<Value>,
	/// Set by the orchestrator once the trailing host param has been popped.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub origin_host: Option<String>,
}

impl RequestEnvelope {
	pub fn new(kind: impl Into<RequestKind>, params: Vec<Value>) -> Self {
		Self {
			kind: kind.into(),
			params,
			origin_host: None,
		}
	}

	/// Appends the calling page's hostname as the trailing param.
	pub fn stamp_origin(&mut self, host: &str) {
		self.params.push(Value::String(host.to_string()));
	}

	/// Pops the trailing hostname param and records it as `origin_host`.
	pub fn take_origin(&mut self) -> Option<String> {
		if !matches!(self.params.last(), Some(Value::String(_))) {
			return None;
		}
		let host = match self.params.pop() {
			Some(Value::String(host)) => normalize_host(&host),
			_ => return None,
		};
		self.origin_host = Some(host.clone());
		Some(host)
	}

	/// Chain family named by the trailing param once the origin is gone.
	/// Untagged requests belong to the EVM family.
	pub fn family(&self) -> Option<&'static str> {
		match self.params.last() {
			Some(Value::String(tag)) if tag == SOLANA_FAMILY => Some(SOLANA_FAMILY),
			_ => None,
		}
	}

	pub fn external_kind(&self) -> Option<ExternalKind> {
		match self.kind {
			RequestKind::External(kind) => Some(kind),
			RequestKind::Internal(_) => None,
		}
	}
}

/// Param tagging a request for the Solana account family.
pub const SOLANA_FAMILY: &str = "solana";

/// Store key of a host's grant for `family`. EVM grants are keyed by the
/// bare host, other families by `<family>:<host>`.
pub fn record_key(host: &str, family: Option<&str>) -> String {
	match family {
		Some(family) => format!("{family}:{}", normalize_host(host)),
		None => normalize_host(host),
	}
}

/// Host a store key belongs to, whatever its family.
pub fn host_of_key(key: &str) -> &str {
	key.split_once(':').map_or(key, |(_, host)| host)
}

/// Lower-cases a hostname and strips a trailing dot.
pub fn normalize_host(host: &str) -> String {
	host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Answer to an external request.
///
/// `payload` and `error` are mutually exclusive:
/// ```json
/// { "kind": "accountResponse", "payload": { "address": "0xabc", "chainId": 1 } }
/// { "kind": "accountResponse", "error": "wallet is not connected" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
	pub kind: ResponseKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ResponseEnvelope {
	pub fn success(kind: ResponseKind, payload: Value) -> Self {
		Self {
			kind,
			payload: Some(payload),
			error: None,
		}
	}

	pub fn failure(kind: ResponseKind, error: impl Into<String>) -> Self {
		Self {
			kind,
			payload: None,
			error: Some(error.into()),
		}
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}

	/// Whether exactly one of `payload`/`error` is present.
	pub fn is_well_formed(&self) -> bool {
		self.payload.is_some() != self.error.is_some()
	}

	pub fn into_result(self) -> Result<Value, String> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.payload.unwrap_or(Value::Null)),
		}
	}

	/// Address carried by a successful payload, if any.
	pub fn address(&self) -> Option<&str> {
		self.payload.as_ref()?.get("address")?.as_str()
	}
}

/// Answer to an internal request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalReply {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl InternalReply {
	pub fn ok(payload: Value) -> Self {
		Self {
			payload: Some(payload),
			error: None,
		}
	}

	pub fn err(error: impl Into<String>) -> Self {
		Self {
			payload: None,
			error: Some(error.into()),
		}
	}
}

/// Display descriptor of the tab that issued a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptor {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fav_icon_url: Option<String>,
}

/// A request handed to the popup, at launch or while it is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupRequest {
	/// Correlation ticket the popup should echo back.
	pub ticket: u64,
	pub request: RequestEnvelope,
	#[serde(default)]
	pub source: TabDescriptor,
}

/// A response emitted by the popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupResponse {
	/// Echoed ticket; when absent the response routes by kind.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ticket: Option<u64>,
	pub response: ResponseEnvelope,
}

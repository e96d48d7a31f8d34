//! Multi-provider discovery and page-facing notices.

use serde::{Deserialize, Serialize};

/// Identity announced in the discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
	/// Stable per-install identifier.
	pub id: String,
	pub name: String,
	/// Data URI of the wallet icon.
	pub icon: String,
	/// Reverse-DNS name, when the page expects one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rdns: Option<String>,
}

/// User preferences read through the `getPreferences` internal kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
	/// Claim the page's default wallet slot in addition to announcing.
	#[serde(default)]
	pub compatibility_mode: bool,
	/// Messaging listener enabled.
	#[serde(default)]
	pub messaging_enabled: bool,
}

/// Background-originated notice pushed to pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WalletNotice {
	/// The origin's authorization was revoked.
	Disconnect,
	#[serde(rename_all = "camelCase")]
	ChainChanged { chain_id: u64 },
	AccountsChanged { accounts: Vec<String> },
}

//! Bridge configuration loaded from `config.json`.
//!
//! Every field has a default, so a missing or partial file yields a usable
//! configuration. The file lives under `$XDG_CONFIG_HOME/wb/` (falling back
//! to `~/.config/wb/`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wb_protocol::ProviderInfo;

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.json";
const STORAGE_FILE: &str = "storage.json";

/// Chain answered for origins without a record.
pub const DEFAULT_CHAIN_ID: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
	pub default_chain_id: u64,
	pub popup: PopupConfig,
	/// Resolve listeners of a closed popup with a disconnected error instead
	/// of leaving them pending.
	pub reject_on_popup_close: bool,
	pub provider: ProviderInfo,
	/// Chain ids the secondary-chain adapter accepts, as `solana:<cluster>`.
	pub solana_chains: Vec<String>,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			default_chain_id: DEFAULT_CHAIN_ID,
			popup: PopupConfig::default(),
			reject_on_popup_close: false,
			provider: ProviderInfo {
				id: "5c9b6a3e-7d2f-4f61-9a0e-b2f1d7c4e8a1".to_string(),
				name: "Wallet Bridge".to_string(),
				icon: "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciLz4=".to_string(),
				rdns: Some("app.walletbridge".to_string()),
			},
			solana_chains: vec!["solana:mainnet".to_string(), "solana:devnet".to_string(), "solana:testnet".to_string()],
		}
	}
}

/// Popup window placement and reuse timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PopupConfig {
	/// Extension page the popup loads; the request is appended as query.
	pub url: String,
	pub width: u32,
	pub height: u32,
	/// Offset from the parent window's top edge.
	pub top_offset: i32,
	/// Gap between the popup and the parent window's right edge.
	pub right_margin: i32,
	/// Wait before re-checking a remembered popup, in milliseconds.
	pub reuse_grace_ms: u64,
}

impl Default for PopupConfig {
	fn default() -> Self {
		Self {
			url: "chrome-extension://wallet-bridge/index.html".to_string(),
			width: 400,
			height: 628,
			top_offset: 80,
			right_margin: 20,
			reuse_grace_ms: 200,
		}
	}
}

impl PopupConfig {
	pub fn reuse_grace(&self) -> Duration {
		Duration::from_millis(self.reuse_grace_ms)
	}
}

impl BridgeConfig {
	/// Reads the config at `path`; a missing file yields defaults.
	pub fn load(path: &Path) -> Result<Self> {
		match fs::read_to_string(path) {
			Ok(content) => serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display()))),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
			Err(err) => Err(err.into()),
		}
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}
}

/// Root directory for config and storage files.
pub fn config_dir() -> PathBuf {
	std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.or_else(|| dirs::home_dir().map(|home| home.join(".config")))
		.unwrap_or_else(|| PathBuf::from("."))
		.join("wb")
}

pub fn default_config_path() -> PathBuf {
	config_dir().join(CONFIG_FILE)
}

pub fn default_storage_path() -> PathBuf {
	config_dir().join(STORAGE_FILE)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_file_keeps_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, r#"{"defaultChainId": 137, "popup": {"width": 360}}"#).unwrap();

		let config = BridgeConfig::load(&path).unwrap();
		assert_eq!(config.default_chain_id, 137);
		assert_eq!(config.popup.width, 360);
		assert_eq!(config.popup.height, PopupConfig::default().height);
		assert!(!config.reject_on_popup_close);
	}

	#[test]
	fn missing_file_yields_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = BridgeConfig::load(&dir.path().join("absent.json")).unwrap();
		assert_eq!(config, BridgeConfig::default());
	}

	#[test]
	fn malformed_file_is_a_config_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		fs::write(&path, "{not json").unwrap();
		assert!(matches!(BridgeConfig::load(&path), Err(Error::Config(_))));
	}
}

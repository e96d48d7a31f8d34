//! Paths and shared handles a command runs against.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use wb::config::{default_config_path, default_storage_path};
use wb::{BridgeConfig, ConnectionStore, FileStorage};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CommandContext {
	config_path: PathBuf,
	storage_path: PathBuf,
}

impl CommandContext {
	/// Explicit paths win over the `$XDG_CONFIG_HOME/wb` defaults.
	pub fn new(config: Option<PathBuf>, storage: Option<PathBuf>) -> Self {
		Self {
			config_path: config.unwrap_or_else(default_config_path),
			storage_path: storage.unwrap_or_else(default_storage_path),
		}
	}

	pub fn config_path(&self) -> &PathBuf {
		&self.config_path
	}

	pub fn storage_path(&self) -> &PathBuf {
		&self.storage_path
	}

	pub fn config(&self) -> Result<BridgeConfig> {
		let config = BridgeConfig::load(&self.config_path).with_context(|| format!("loading {}", self.config_path.display()))?;
		Ok(config)
	}

	pub fn store(&self) -> ConnectionStore {
		ConnectionStore::new(Arc::new(FileStorage::new(self.storage_path.clone())))
	}
}

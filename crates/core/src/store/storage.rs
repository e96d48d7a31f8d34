//! Key/value storage areas backing the connection store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Extension-style storage area holding JSON values by key.
#[async_trait]
pub trait StorageArea: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<Value>>;
	async fn set(&self, key: &str, value: Value) -> Result<()>;
	async fn remove(&self, key: &str) -> Result<()>;
	async fn clear(&self) -> Result<()>;
}

/// In-memory storage, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageArea for MemoryStorage {
	async fn get(&self, key: &str) -> Result<Option<Value>> {
		Ok(self.entries.lock().get(key).cloned())
	}

	async fn set(&self, key: &str, value: Value) -> Result<()> {
		self.entries.lock().insert(key.to_string(), value);
		Ok(())
	}

	async fn remove(&self, key: &str) -> Result<()> {
		self.entries.lock().remove(key);
		Ok(())
	}

	async fn clear(&self) -> Result<()> {
		self.entries.lock().clear();
		Ok(())
	}
}

/// Storage persisted as one pretty-printed JSON object on disk.
///
/// Every operation reads the file fresh, so two processes sharing a file see
/// each other's writes with last-write-wins semantics.
#[derive(Debug, Clone)]
pub struct FileStorage {
	path: PathBuf,
}

impl FileStorage {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(&self) -> Result<BTreeMap<String, Value>> {
		match fs::read_to_string(&self.path) {
			Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
			Ok(content) => serde_json::from_str(&content).map_err(|e| Error::Storage(format!("{}: {e}", self.path.display()))),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
			Err(err) => Err(err.into()),
		}
	}

	fn save(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
		Ok(())
	}
}

#[async_trait]
impl StorageArea for FileStorage {
	async fn get(&self, key: &str) -> Result<Option<Value>> {
		Ok(self.load()?.remove(key))
	}

	async fn set(&self, key: &str, value: Value) -> Result<()> {
		let mut entries = self.load()?;
		entries.insert(key.to_string(), value);
		self.save(&entries)
	}

	async fn remove(&self, key: &str) -> Result<()> {
		let mut entries = self.load()?;
		if entries.remove(key).is_some() {
			self.save(&entries)?;
		}
		Ok(())
	}

	async fn clear(&self) -> Result<()> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(err) => Err(err.into()),
		}
	}
}

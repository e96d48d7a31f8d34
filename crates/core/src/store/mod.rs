//! Persistent per-origin authorization records.
//!
//! Records live in a [`StorageArea`] under one schema-versioned map keyed
//! by lower-cased hostname. Reads and merge-writes are not locked across
//! processes; concurrent flows for one origin resolve last-write-wins.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;
use wb_protocol::{ConnectionRecord, ConnectionUpdate, Preferences, normalize_host};

use crate::error::{Error, Result};

mod storage;

pub use storage::{FileStorage, MemoryStorage, StorageArea};

const CONNECTIONS_KEY: &str = "connections";
const PREFERENCES_KEY: &str = "preferences";
const CONNECTIONS_SCHEMA_VERSION: u32 = 1;

/// Stored shape under the `connections` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionsFile {
	schema: u32,
	#[serde(default)]
	origins: BTreeMap<String, ConnectionRecord>,
}

impl Default for ConnectionsFile {
	fn default() -> Self {
		Self {
			schema: CONNECTIONS_SCHEMA_VERSION,
			origins: BTreeMap::new(),
		}
	}
}

/// Connection records keyed by origin.
#[derive(Clone)]
pub struct ConnectionStore {
	storage: Arc<dyn StorageArea>,
}

impl ConnectionStore {
	pub fn new(storage: Arc<dyn StorageArea>) -> Self {
		Self { storage }
	}

	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryStorage::new()))
	}

	pub fn storage(&self) -> &Arc<dyn StorageArea> {
		&self.storage
	}

	pub async fn get(&self, origin: &str) -> Result<Option<ConnectionRecord>> {
		Ok(self.load().await?.origins.remove(&normalize_host(origin)))
	}

	/// All records, ordered by origin.
	pub async fn list(&self) -> Result<BTreeMap<String, ConnectionRecord>> {
		Ok(self.load().await?.origins)
	}

	/// Merges `update` into the record for `origin`, creating it if needed.
	pub async fn merge(&self, origin: &str, update: ConnectionUpdate) -> Result<ConnectionRecord> {
		self.merge_at(origin, update, now_ms()).await
	}

	pub(crate) async fn merge_at(&self, origin: &str, update: ConnectionUpdate, now_ms: u64) -> Result<ConnectionRecord> {
		let origin = normalize_host(origin);
		let mut file = self.load().await?;
		let record = file.origins.entry(origin.clone()).or_default();
		record.merge(update, now_ms);
		let merged = record.clone();
		self.save(&file).await?;
		debug!(target = "wb.store", %origin, accounts = merged.accounts.len(), chain_id = ?merged.chain_id, "connection merged");
		Ok(merged)
	}

	/// Removes one origin's record. Returns whether one existed.
	pub async fn remove(&self, origin: &str) -> Result<bool> {
		let mut file = self.load().await?;
		let removed = file.origins.remove(&normalize_host(origin)).is_some();
		if removed {
			self.save(&file).await?;
		}
		Ok(removed)
	}

	/// Drops every record. Returns the origins that were removed.
	pub async fn clear(&self) -> Result<Vec<String>> {
		let file = self.load().await?;
		self.storage.remove(CONNECTIONS_KEY).await?;
		Ok(file.origins.into_keys().collect())
	}

	pub async fn preferences(&self) -> Result<Preferences> {
		match self.storage.get(PREFERENCES_KEY).await? {
			Some(value) => serde_json::from_value(value).map_err(|e| Error::Storage(format!("preferences: {e}"))),
			None => Ok(Preferences::default()),
		}
	}

	pub async fn set_preferences(&self, preferences: &Preferences) -> Result<()> {
		self.storage.set(PREFERENCES_KEY, serde_json::to_value(preferences)?).await
	}

	async fn load(&self) -> Result<ConnectionsFile> {
		let Some(value) = self.storage.get(CONNECTIONS_KEY).await? else {
			return Ok(ConnectionsFile::default());
		};
		let file: ConnectionsFile = serde_json::from_value(value).map_err(|e| Error::Storage(format!("connections: {e}")))?;
		if file.schema > CONNECTIONS_SCHEMA_VERSION {
			return Err(Error::Storage(format!("connections schema {} is newer than supported {}", file.schema, CONNECTIONS_SCHEMA_VERSION)));
		}
		Ok(file)
	}

	async fn save(&self, file: &ConnectionsFile) -> Result<()> {
		self.storage.set(CONNECTIONS_KEY, serde_json::to_value(file)?).await
	}
}

pub(crate) fn now_ms() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default()
}

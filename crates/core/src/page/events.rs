//! Standard wallet event subscription surface.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

/// Events a page can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEvent {
	Connect,
	Disconnect,
	AccountsChanged,
	ChainChanged,
	/// Wallet-standard `change` event of the secondary-chain adapter.
	Change,
}

impl ProviderEvent {
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderEvent::Connect => "connect",
			ProviderEvent::Disconnect => "disconnect",
			ProviderEvent::AccountsChanged => "accountsChanged",
			ProviderEvent::ChainChanged => "chainChanged",
			ProviderEvent::Change => "change",
		}
	}
}

impl fmt::Display for ProviderEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProviderEvent {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"connect" => Ok(ProviderEvent::Connect),
			"disconnect" => Ok(ProviderEvent::Disconnect),
			"accountsChanged" => Ok(ProviderEvent::AccountsChanged),
			"chainChanged" => Ok(ProviderEvent::ChainChanged),
			"change" => Ok(ProviderEvent::Change),
			other => Err(format!("unknown event: {other}")),
		}
	}
}

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Synchronous fan-out of events to registered callbacks.
#[derive(Default)]
pub struct EventEmitter {
	next_id: AtomicU64,
	listeners: Mutex<Vec<(ListenerId, ProviderEvent, Callback)>>,
}

impl EventEmitter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn on(&self, event: ProviderEvent, callback: impl Fn(&Value) + Send + Sync + 'static) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.listeners.lock().push((id, event, Arc::new(callback)));
		id
	}

	/// Returns whether `id` was registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.lock();
		let before = listeners.len();
		listeners.retain(|(listener, _, _)| *listener != id);
		listeners.len() != before
	}

	pub fn listener_count(&self, event: ProviderEvent) -> usize {
		self.listeners.lock().iter().filter(|(_, e, _)| *e == event).count()
	}

	/// Calls every listener of `event` in registration order.
	///
	/// Callbacks run outside the registry lock, so they may subscribe or
	/// unsubscribe.
	pub fn emit(&self, event: ProviderEvent, payload: &Value) {
		let callbacks: Vec<Callback> = self
			.listeners
			.lock()
			.iter()
			.filter(|(_, e, _)| *e == event)
			.map(|(_, _, callback)| Arc::clone(callback))
			.collect();
		tracing::trace!(target = "wb.page", event = event.as_str(), listeners = callbacks.len(), "emit");
		for callback in callbacks {
			callback(payload);
		}
	}
}

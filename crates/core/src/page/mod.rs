//! Provider object injected into the untrusted page.
//!
//! Requests are serialized: a fair lock admits one at a time in arrival
//! order. A pending counter is raised before a caller queues and lowered
//! once it settles, still inside its turn; when it drops back to zero the
//! page posts a `closeWindow` request so an idle popup goes away.
//!
//! Successful account or chain answers refresh the cached state, which
//! answers later read-only queries without a round trip. Only a
//! `disconnect` (notice or explicit call) or a chain switch invalidates it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use wb_protocol::{
	ETH_ACCOUNTS_CAPABILITY, ExternalKind, ProviderErrorCode, ProviderInfo, RequestEnvelope, WalletError, WalletNotice, chain_id_hex, parse_chain_id,
};
use wb_runtime::{Connection, TransportParts};

pub mod discovery;
mod error;
pub mod events;
pub mod solana;

pub use discovery::{Announcement, Discovery, PageGlobals};
pub use error::ProviderError;
pub use events::{EventEmitter, ListenerId, ProviderEvent};
pub use solana::SolanaWallet;

/// Result type of every page-facing call.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Last known account and chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedAccountState {
	pub address: Option<String>,
	pub chain_id: Option<u64>,
}

impl CachedAccountState {
	fn account_payload(&self) -> Option<Value> {
		Some(json!({ "address": self.address.as_ref()?, "chainId": self.chain_id? }))
	}

	fn chain_payload(&self) -> Option<Value> {
		let chain_id = self.chain_id?;
		Some(match &self.address {
			Some(address) => json!({ "chainId": chain_id, "address": address }),
			None => json!({ "chainId": chain_id }),
		})
	}
}

pub struct PageProvider {
	connection: Arc<Connection>,
	info: ProviderInfo,
	gate: tokio::sync::Mutex<()>,
	pending: AtomicUsize,
	cache: Mutex<CachedAccountState>,
	events: EventEmitter,
}

impl PageProvider {
	/// Builds a provider over an established connection. Notices are not
	/// consumed until [`PageProvider::listen`] runs.
	pub fn new(connection: Arc<Connection>, info: ProviderInfo) -> Self {
		Self {
			connection,
			info,
			gate: tokio::sync::Mutex::new(()),
			pending: AtomicUsize::new(0),
			cache: Mutex::new(CachedAccountState::default()),
			events: EventEmitter::new(),
		}
	}

	/// Connects over `parts`, starting the dispatch loop and the notice listener.
	pub fn connect(parts: TransportParts, info: ProviderInfo) -> Arc<Self> {
		let connection = Arc::new(Connection::new(parts));
		let notices = connection.subscribe_notices();
		let runner = Arc::clone(&connection);
		tokio::spawn(async move { runner.run().await });
		let provider = Arc::new(Self::new(connection, info));
		tokio::spawn(Self::listen(Arc::downgrade(&provider), notices));
		provider
	}

	/// Applies background notices until the connection or the provider goes away.
	pub async fn listen(provider: Weak<Self>, mut notices: broadcast::Receiver<WalletNotice>) {
		loop {
			let notice = match notices.recv().await {
				Ok(notice) => notice,
				Err(RecvError::Lagged(skipped)) => {
					warn!(target = "wb.page", skipped, "notices dropped");
					continue;
				}
				Err(RecvError::Closed) => break,
			};
			let Some(provider) = provider.upgrade() else {
				break;
			};
			provider.apply_notice(notice);
		}
	}

	pub fn info(&self) -> &ProviderInfo {
		&self.info
	}

	/// Always `true`: the bridge itself is reachable even when no account is.
	pub fn is_connected(&self) -> bool {
		true
	}

	pub fn cached(&self) -> CachedAccountState {
		self.cache.lock().clone()
	}

	/// Requests queued or in flight.
	pub fn pending(&self) -> usize {
		self.pending.load(Ordering::SeqCst)
	}

	pub fn on(&self, event: ProviderEvent, callback: impl Fn(&Value) + Send + Sync + 'static) -> ListenerId {
		self.events.on(event, callback)
	}

	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.events.remove_listener(id)
	}

	/// Sends one request and returns its payload.
	pub async fn request(&self, kind: ExternalKind, params: Vec<Value>) -> ProviderResult<Value> {
		if let Some(cached) = self.from_cache(kind) {
			return Ok(cached);
		}
		self.round_trip(kind, params, kind.is_account_bearing()).await
	}

	/// Sends one request through the same queue but leaves the cached
	/// account state and its events alone. Used by adapters for other
	/// chain families.
	pub(crate) async fn request_uncached(&self, kind: ExternalKind, params: Vec<Value>) -> ProviderResult<Value> {
		self.round_trip(kind, params, false).await
	}

	async fn round_trip(&self, kind: ExternalKind, params: Vec<Value>, absorb: bool) -> ProviderResult<Value> {
		self.pending.fetch_add(1, Ordering::SeqCst);
		let _turn = self.gate.lock().await;
		let result = self.dispatch(kind, params).await;
		if let (true, Ok(payload)) = (absorb, &result) {
			self.absorb(payload);
		}
		// The close signal goes out before the next queued caller can dispatch.
		if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
			self.signal_idle().await;
		}
		result
	}

	fn from_cache(&self, kind: ExternalKind) -> Option<Value> {
		let cache = self.cache.lock();
		match kind {
			ExternalKind::Account => cache.account_payload(),
			ExternalKind::ChainId => cache.chain_payload(),
			_ => None,
		}
	}

	async fn dispatch(&self, kind: ExternalKind, params: Vec<Value>) -> ProviderResult<Value> {
		let response = self.connection.send_request(RequestEnvelope::new(kind, params)).await?;
		if response.kind != kind.response_kind() || !response.is_well_formed() {
			warn!(target = "wb.page", expected = kind.response_kind().as_str(), got = response.kind.as_str(), "response does not match request");
			return Err(ProviderError::unexpected());
		}
		response.into_result().map_err(|message| ProviderError::from_message(&message))
	}

	async fn signal_idle(&self) {
		debug!(target = "wb.page", "queue drained, closing popup");
		if let Err(e) = self.connection.post(RequestEnvelope::new(ExternalKind::CloseWindow, vec![])).await {
			debug!(target = "wb.page", error = %e, "close signal not sent");
		}
	}

	/// Updates the cache from an account-bearing payload and emits what changed.
	fn absorb(&self, payload: &Value) {
		let address = payload.get("address").and_then(Value::as_str).filter(|a| !a.is_empty());
		let chain_id = payload.get("chainId").and_then(parse_chain_id);

		let (connected, accounts_changed, chain_changed) = {
			let mut cache = self.cache.lock();
			let was_connected = cache.address.is_some();
			let accounts_changed = address.is_some_and(|a| cache.address.as_deref() != Some(a));
			let chain_changed = chain_id.is_some_and(|c| cache.chain_id != Some(c));
			if let Some(address) = address {
				cache.address = Some(address.to_string());
			}
			if let Some(chain_id) = chain_id {
				cache.chain_id = Some(chain_id);
			}
			(!was_connected && cache.address.is_some(), accounts_changed, chain_changed)
		};

		let state = self.cached();
		if connected {
			self.events.emit(ProviderEvent::Connect, &json!({ "chainId": state.chain_id.map(chain_id_hex) }));
		}
		if accounts_changed {
			self.events.emit(ProviderEvent::AccountsChanged, &json!(state.address.into_iter().collect::<Vec<_>>()));
		}
		if chain_changed {
			if let Some(chain_id) = state.chain_id {
				self.events.emit(ProviderEvent::ChainChanged, &json!(chain_id_hex(chain_id)));
			}
		}
	}

	/// Drops the cached account and emits `disconnect`.
	pub fn disconnect(&self) {
		*self.cache.lock() = CachedAccountState::default();
		self.events.emit(ProviderEvent::Disconnect, &json!(ProviderError::from(WalletError::Disconnected)));
	}

	fn apply_notice(&self, notice: WalletNotice) {
		debug!(target = "wb.page", ?notice, "notice");
		match notice {
			WalletNotice::Disconnect => self.disconnect(),
			WalletNotice::ChainChanged { chain_id } => {
				let changed = self.cache.lock().chain_id.replace(chain_id) != Some(chain_id);
				if changed {
					self.events.emit(ProviderEvent::ChainChanged, &json!(chain_id_hex(chain_id)));
				}
			}
			WalletNotice::AccountsChanged { accounts } => {
				self.cache.lock().address = accounts.first().cloned();
				self.events.emit(ProviderEvent::AccountsChanged, &json!(accounts));
			}
		}
	}

	/// EIP-1193 `request({ method, params })`.
	pub async fn request_method(&self, method: &str, params: Vec<Value>) -> ProviderResult<Value> {
		match method {
			"eth_accounts" => match self.request(ExternalKind::Account, Vec::new()).await {
				Ok(payload) => Ok(accounts_of(&payload)),
				Err(e) if e.code == ProviderErrorCode::Disconnected => Ok(json!([])),
				Err(e) => Err(e),
			},
			"eth_requestAccounts" => {
				let payload = self.request(ExternalKind::SelectAccount, Vec::new()).await?;
				Ok(accounts_of(&payload))
			}
			"eth_chainId" => Ok(json!(chain_id_hex(self.chain_id().await?))),
			"net_version" => Ok(json!(self.chain_id().await?.to_string())),
			"wallet_requestPermissions" => {
				validate_permissions(&params)?;
				let payload = self.request(ExternalKind::RequestPermissions, params).await?;
				Ok(payload
					.get("permissions")
					.cloned()
					.unwrap_or_else(|| json!([{ "parentCapability": ETH_ACCOUNTS_CAPABILITY }])))
			}
			"personal_sign" => {
				require_strings(&params, WalletError::InvalidSignatureParams)?;
				self.request(ExternalKind::SignMessage, params).await
			}
			"eth_signTypedData_v4" => {
				validate_typed_data(&params)?;
				self.request(ExternalKind::SignTypedMessage, params).await
			}
			"eth_sendTransaction" => {
				validate_transaction(&params)?;
				self.request(ExternalKind::SendTransaction, params).await
			}
			"wallet_switchEthereumChain" => {
				let chain_id = params
					.first()
					.and_then(|p| p.get("chainId"))
					.filter(|id| id.as_str().is_some_and(|s| s.starts_with("0x")))
					.and_then(parse_chain_id)
					.ok_or(WalletError::InvalidSwitchChainParams)?;
				self.request(ExternalKind::SwitchChain, vec![json!({ "chainId": chain_id_hex(chain_id) })]).await?;
				Ok(Value::Null)
			}
			other => {
				debug!(target = "wb.page", method = other, "method not implemented");
				Err(WalletError::NotImplemented.into())
			}
		}
	}

	async fn chain_id(&self) -> ProviderResult<u64> {
		let payload = self.request(ExternalKind::ChainId, Vec::new()).await?;
		payload.get("chainId").and_then(parse_chain_id).ok_or_else(ProviderError::unexpected)
	}
}

fn accounts_of(payload: &Value) -> Value {
	match payload.get("address").and_then(Value::as_str) {
		Some(address) => json!([address]),
		None => json!([]),
	}
}

fn require_strings(params: &[Value], error: WalletError) -> ProviderResult<()> {
	if params.len() < 2 || !params[..2].iter().all(Value::is_string) {
		return Err(error.into());
	}
	Ok(())
}

fn validate_typed_data(params: &[Value]) -> ProviderResult<()> {
	match params {
		[Value::String(_), Value::String(_) | Value::Object(_), ..] => Ok(()),
		_ => Err(WalletError::InvalidSignatureParams.into()),
	}
}

fn validate_transaction(params: &[Value]) -> ProviderResult<()> {
	let valid = params.first().and_then(Value::as_object).is_some_and(|tx| tx.get("from").is_some_and(Value::is_string));
	if !valid {
		return Err(WalletError::InvalidTransactionParams.into());
	}
	Ok(())
}

fn validate_permissions(params: &[Value]) -> ProviderResult<()> {
	let Some(requested) = params.first().and_then(Value::as_object) else {
		return Err(WalletError::UnsupportedPermission.into());
	};
	if requested.is_empty() || requested.keys().any(|capability| capability != ETH_ACCOUNTS_CAPABILITY) {
		return Err(WalletError::UnsupportedPermission.into());
	}
	Ok(())
}

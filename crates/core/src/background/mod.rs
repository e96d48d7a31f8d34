//! Background orchestrator: the privileged router behind every relay.
//!
//! # Request Flow
//!
//! 1. A relay calls a [`BackgroundHandle`] with an envelope
//! 2. The serve loop spawns one task per request and calls [`Orchestrator::handle`]
//! 3. Internal kinds are answered directly with an [`InternalReply`]
//! 4. External kinds pop the trailing host, try [`short_circuit`] against
//!    the grant of their chain family and otherwise hand the request to the
//!    single popup window
//! 5. The popup answers through [`Orchestrator::deliver_popup_response`]; the
//!    parked listener resumes, persists any address it carries and settles
//!
//! Every request settles with exactly one JSON value. Failures become error
//! envelopes; nothing is thrown back across the channel.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use wb_protocol::{
	ConnectionUpdate, ExternalKind, InternalKind, InternalReply, PopupRequest, PopupResponse, RequestEnvelope, RequestKind, ResponseEnvelope, SOLANA_FAMILY,
	TabDescriptor, WalletError, WalletNotice, host_of_key, record_key,
};
use wb_runtime::PrivilegedChannel;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::store::ConnectionStore;

pub mod platform;
pub mod popup_window;
pub mod short_circuit;
pub mod state;
#[cfg(test)]
mod tests;

pub use platform::{IconState, Platform, PopupSpec, TabId, TabInfo, WindowBounds, WindowId, host_of};
pub use short_circuit::short_circuit;
pub use state::{OrchestratorState, PopupHandle};

/// Who sent a request, as attested by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSender {
	pub tab_id: Option<TabId>,
	/// Full URL of the sending frame.
	pub url: Option<String>,
}

/// One request arriving at the background.
#[derive(Debug, Clone)]
pub struct InboundRequest {
	pub envelope: RequestEnvelope,
	pub sender: MessageSender,
}

/// Central router owning the connection store and the popup window.
pub struct Orchestrator {
	platform: Arc<dyn Platform>,
	store: ConnectionStore,
	config: BridgeConfig,
	state: Mutex<OrchestratorState>,
	/// Serializes popup lookup and creation so two requests never open two windows.
	popup_gate: tokio::sync::Mutex<()>,
}

impl Orchestrator {
	pub fn new(platform: Arc<dyn Platform>, store: ConnectionStore, config: BridgeConfig) -> Self {
		Self {
			platform,
			store,
			config,
			state: Mutex::new(OrchestratorState::default()),
			popup_gate: tokio::sync::Mutex::new(()),
		}
	}

	pub fn store(&self) -> &ConnectionStore {
		&self.store
	}

	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	pub fn popup(&self) -> Option<PopupHandle> {
		self.state.lock().popup()
	}

	pub fn focused_window(&self) -> Option<WindowId> {
		self.state.lock().focused_window()
	}

	/// Requests currently waiting on the popup.
	pub fn pending_listeners(&self) -> usize {
		self.state.lock().listener_count()
	}

	/// Spawns the serve loop and returns a channel relays can clone.
	pub fn spawn(self: Arc<Self>) -> BackgroundChannel {
		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(self.serve(rx));
		BackgroundChannel { tx }
	}

	async fn serve(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Dispatch>) {
		while let Some(Dispatch { request, reply }) = rx.recv().await {
			let this = Arc::clone(&self);
			tokio::spawn(async move {
				let answer = this.handle(request).await;
				let _ = reply.send(answer);
			});
		}
		debug!(target = "wb.background", "serve loop ended");
	}

	/// Handles one request and returns its settled answer.
	///
	/// External kinds answer with a serialized [`ResponseEnvelope`], internal
	/// kinds with an [`InternalReply`].
	pub async fn handle(&self, request: InboundRequest) -> Value {
		let InboundRequest { envelope, sender } = request;
		match envelope.kind {
			RequestKind::Internal(kind) => to_json(&self.handle_internal(kind, &envelope.params).await),
			RequestKind::External(kind) => to_json(&self.handle_external(kind, envelope, &sender).await),
		}
	}

	async fn handle_internal(&self, kind: InternalKind, params: &[Value]) -> InternalReply {
		let result = match kind {
			InternalKind::GetPreferences => self.store.preferences().await.and_then(|p| serde_json::to_value(p).map_err(Error::from)),
			InternalKind::SetBadgeCount => self.set_badge_count(params.first()).await,
			InternalKind::MessagingReady => self.messaging_ready().await,
			InternalKind::RefreshIcons => self.refresh_icons().await.map(|count| json!({ "updated": count })),
			InternalKind::FocusedWindow => Ok(json!({ "windowId": self.focused_window() })),
		};
		match result {
			Ok(payload) => InternalReply::ok(payload),
			Err(e) => {
				warn!(target = "wb.background", kind = kind.as_str(), error = %e, "internal request failed");
				InternalReply::err(e.envelope_message())
			}
		}
	}

	async fn set_badge_count(&self, count: Option<&Value>) -> Result<Value> {
		let count = count.and_then(Value::as_u64).unwrap_or(0);
		let text = if count > 0 { count.to_string() } else { String::new() };
		self.platform.set_badge_text(&text).await?;
		Ok(json!({ "text": text }))
	}

	async fn messaging_ready(&self) -> Result<Value> {
		self.state.lock().set_messaging_ready();
		let preferences = self.store.preferences().await?;
		debug!(target = "wb.background", enabled = preferences.messaging_enabled, "messaging listener ready");
		Ok(json!({ "ready": true, "enabled": preferences.messaging_enabled }))
	}

	async fn handle_external(&self, kind: ExternalKind, envelope: RequestEnvelope, sender: &MessageSender) -> ResponseEnvelope {
		match self.resolve_external(kind, envelope, sender).await {
			Ok(response) => response,
			Err(e) => {
				warn!(target = "wb.background", kind = kind.as_str(), error = %e, "external request failed");
				ResponseEnvelope::failure(kind.response_kind(), e.envelope_message())
			}
		}
	}

	async fn resolve_external(&self, kind: ExternalKind, mut envelope: RequestEnvelope, sender: &MessageSender) -> Result<ResponseEnvelope> {
		let origin = self.origin_of(&mut envelope, sender)?;
		let source = self.find_source_tab(sender, &origin).await?;
		let descriptor = source.as_ref().map(TabInfo::descriptor).unwrap_or_else(TabDescriptor::default);

		if kind == ExternalKind::CloseWindow {
			return self.close_window(envelope, descriptor).await;
		}

		let key = record_key(&origin, envelope.family());
		let record = self.store.get(&key).await?;
		if let Some(response) = short_circuit(kind, record.as_ref(), self.config.default_chain_id) {
			debug!(target = "wb.background", %origin, %key, kind = kind.as_str(), "answered without popup");
			return Ok(response);
		}

		let ticket = self.state.lock().next_ticket();
		let request = PopupRequest {
			ticket,
			request: envelope,
			source: descriptor,
		};
		let parent = source.map(|tab| tab.window_id).or_else(|| self.focused_window());
		let rx = self.state.lock().attach(ticket, kind.response_kind());
		if let Err(e) = self.present(&request, parent).await {
			self.state.lock().detach(ticket);
			return Err(e);
		}

		let response = match rx.await {
			Ok(response) if response.is_well_formed() && response.kind == kind.response_kind() => response,
			Ok(response) => {
				warn!(target = "wb.background", kind = response.kind.as_str(), "malformed popup response");
				ResponseEnvelope::failure(kind.response_kind(), WalletError::UnexpectedResponse.message())
			}
			Err(_) => ResponseEnvelope::failure(kind.response_kind(), WalletError::Disconnected.message()),
		};

		if let Some(update) = response.payload.as_ref().and_then(ConnectionUpdate::from_payload) {
			if let Err(e) = self.persist(&origin, &key, update).await {
				warn!(target = "wb.background", %origin, %key, error = %e, "failed to persist connection");
			}
		}
		Ok(response)
	}

	/// Host the request speaks for. The attested sender URL wins over the
	/// self-reported trailing param.
	fn origin_of(&self, envelope: &mut RequestEnvelope, sender: &MessageSender) -> Result<String> {
		let claimed = envelope.take_origin();
		let attested = sender.url.as_deref().and_then(host_of);
		match (attested, claimed) {
			(Some(attested), Some(claimed)) => {
				if attested != claimed {
					warn!(target = "wb.background", %attested, %claimed, "self-reported host differs from sender");
				}
				Ok(attested)
			}
			(Some(host), None) | (None, Some(host)) => Ok(host),
			(None, None) => Err(Error::Platform(format!("{} carries no origin host", envelope.kind.as_str()))),
		}
	}

	async fn find_source_tab(&self, sender: &MessageSender, origin: &str) -> Result<Option<TabInfo>> {
		if let Some(tab_id) = sender.tab_id {
			if let Some(tab) = self.platform.tab(tab_id).await? {
				return Ok(Some(tab));
			}
		}
		Ok(self.platform.active_tabs().await?.into_iter().find(|tab| tab.url.contains(origin)))
	}

	/// Hands `request` to the live popup, opening one when there is none.
	async fn present(&self, request: &PopupRequest, parent: Option<WindowId>) -> Result<()> {
		let _gate = self.popup_gate.lock().await;
		match self.live_popup().await? {
			Some(handle) => {
				debug!(target = "wb.background", window_id = handle.window_id, ticket = request.ticket, "reusing popup");
				self.state.lock().bind_window(request.ticket, handle.window_id);
				self.platform.send_to_popup(handle.window_id, request).await
			}
			None => {
				self.open_popup(request, parent).await?;
				Ok(())
			}
		}
	}

	/// The remembered popup, if its window still exists after the grace wait.
	async fn live_popup(&self) -> Result<Option<PopupHandle>> {
		let Some(handle) = self.popup() else {
			return Ok(None);
		};
		tokio::time::sleep(self.config.popup.reuse_grace()).await;
		if self.platform.window_bounds(handle.window_id).await?.is_some() {
			return Ok(Some(handle));
		}
		debug!(target = "wb.background", window_id = handle.window_id, "remembered popup is gone");
		self.state.lock().clear_popup_if(handle.window_id);
		Ok(None)
	}

	async fn open_popup(&self, request: &PopupRequest, parent: Option<WindowId>) -> Result<WindowId> {
		let url = popup_window::launch_url(&self.config.popup.url, request)?;
		let parent_bounds = match parent {
			Some(window_id) => self.platform.window_bounds(window_id).await?,
			None => None,
		};
		let window_id = self.platform.create_popup(popup_window::popup_spec(&self.config.popup, url, parent_bounds)).await?;
		{
			let mut state = self.state.lock();
			state.set_popup(PopupHandle {
				window_id,
				parent_window_id: parent,
			});
			state.bind_window(request.ticket, window_id);
		}
		info!(target = "wb.background", window_id, ticket = request.ticket, "popup opened");
		Ok(window_id)
	}

	async fn close_window(&self, envelope: RequestEnvelope, source: TabDescriptor) -> Result<ResponseEnvelope> {
		let response_kind = ExternalKind::CloseWindow.response_kind();
		let _gate = self.popup_gate.lock().await;
		let Some(handle) = self.popup() else {
			return Ok(ResponseEnvelope::success(response_kind, json!({ "closed": false })));
		};
		if self.platform.window_bounds(handle.window_id).await?.is_none() {
			self.state.lock().clear_popup_if(handle.window_id);
			return Ok(ResponseEnvelope::success(response_kind, json!({ "closed": false })));
		}
		let ticket = self.state.lock().next_ticket();
		let request = PopupRequest {
			ticket,
			request: envelope,
			source,
		};
		self.platform.send_to_popup(handle.window_id, &request).await?;
		debug!(target = "wb.background", window_id = handle.window_id, "close signal forwarded");
		Ok(ResponseEnvelope::success(response_kind, json!({ "closed": true })))
	}

	/// Merges `update` into the grant stored under `key` and lights the
	/// icon of every tab on `origin`.
	async fn persist(&self, origin: &str, key: &str, update: ConnectionUpdate) -> Result<()> {
		self.store.merge(key, update).await?;
		for tab in self.tabs_of(origin).await? {
			self.platform.set_icon(tab.id, IconState::Connected).await?;
		}
		Ok(())
	}

	async fn tabs_of(&self, origin: &str) -> Result<Vec<TabInfo>> {
		Ok(self
			.platform
			.all_tabs()
			.await?
			.into_iter()
			.filter(|tab| tab.host().as_deref() == Some(origin))
			.collect())
	}

	/// Routes a popup response to the request waiting for it.
	///
	/// Returns `false` when nobody is waiting for that ticket or kind.
	pub fn deliver_popup_response(&self, response: PopupResponse) -> bool {
		let listener = self.state.lock().take_listener(&response);
		match listener {
			Some(listener) => {
				debug!(target = "wb.background", ticket = listener.ticket, kind = listener.kind.as_str(), "popup response delivered");
				listener.resolve(response.response);
				true
			}
			None => {
				debug!(target = "wb.background", kind = response.response.kind.as_str(), ticket = ?response.ticket, "no listener for popup response");
				false
			}
		}
	}

	pub async fn on_tab_activated(&self, tab_id: TabId) -> Result<()> {
		if let Some(tab) = self.platform.tab(tab_id).await? {
			self.update_icon(&tab).await?;
		}
		Ok(())
	}

	pub async fn on_tab_created(&self, tab: &TabInfo) -> Result<()> {
		self.update_icon(tab).await
	}

	pub async fn on_tab_updated(&self, tab: &TabInfo) -> Result<()> {
		self.update_icon(tab).await
	}

	/// Tracks the last focused window other than the popup itself.
	pub fn on_window_focus_changed(&self, window_id: Option<WindowId>) {
		let Some(window_id) = window_id else {
			return;
		};
		let mut state = self.state.lock();
		if state.popup().is_some_and(|p| p.window_id == window_id) {
			return;
		}
		state.set_focused_window(window_id);
	}

	pub fn on_window_removed(&self, window_id: WindowId) {
		let mut state = self.state.lock();
		if !state.clear_popup_if(window_id) {
			return;
		}
		debug!(target = "wb.background", window_id, "popup closed");
		if !self.config.reject_on_popup_close {
			return;
		}
		for listener in state.take_window_listeners(window_id) {
			let kind = listener.kind;
			listener.resolve(ResponseEnvelope::failure(kind, WalletError::Disconnected.message()));
		}
	}

	/// Re-evaluates the icon of every open tab. Returns how many tabs were visited.
	pub async fn refresh_icons(&self) -> Result<usize> {
		let tabs = self.platform.all_tabs().await?;
		for tab in &tabs {
			self.update_icon(tab).await?;
		}
		Ok(tabs.len())
	}

	async fn update_icon(&self, tab: &TabInfo) -> Result<()> {
		let connected = match tab.host() {
			Some(host) => self.host_connected(&host).await?,
			None => false,
		};
		let icon = if connected { IconState::Connected } else { IconState::Default };
		self.platform.set_icon(tab.id, icon).await
	}

	/// Whether any chain family holds a live grant for `host`.
	async fn host_connected(&self, host: &str) -> Result<bool> {
		for family in [None, Some(SOLANA_FAMILY)] {
			if self.store.get(&record_key(host, family)).await?.is_some_and(|r| r.is_connected()) {
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// Revokes `origin` for every chain family: drops its records, resets
	/// icons and tells its tabs.
	pub async fn disconnect_origin(&self, origin: &str) -> Result<bool> {
		let origin = wb_protocol::normalize_host(origin);
		let mut removed = false;
		for family in [None, Some(SOLANA_FAMILY)] {
			removed |= self.store.remove(&record_key(&origin, family)).await?;
		}
		if removed {
			for tab in self.tabs_of(&origin).await? {
				self.revoke_tab(&tab).await?;
			}
			info!(target = "wb.background", %origin, "origin disconnected");
		}
		Ok(removed)
	}

	/// Revokes every origin. Returns the store keys that had records.
	pub async fn disconnect_all(&self) -> Result<Vec<String>> {
		let cleared = self.store.clear().await?;
		for tab in self.platform.all_tabs().await? {
			if tab.host().is_some_and(|host| cleared.iter().any(|key| host_of_key(key) == host)) {
				self.revoke_tab(&tab).await?;
			}
		}
		info!(target = "wb.background", count = cleared.len(), "all origins disconnected");
		Ok(cleared)
	}

	async fn revoke_tab(&self, tab: &TabInfo) -> Result<()> {
		self.platform.set_icon(tab.id, IconState::Default).await?;
		self.platform.notify_tab(tab.id, &WalletNotice::Disconnect).await
	}
}

fn to_json<T: Serialize>(value: &T) -> Value {
	serde_json::to_value(value).unwrap_or(Value::Null)
}

struct Dispatch {
	request: InboundRequest,
	reply: oneshot::Sender<Value>,
}

/// Sending side of the serve loop.
#[derive(Clone)]
pub struct BackgroundChannel {
	tx: mpsc::UnboundedSender<Dispatch>,
}

impl BackgroundChannel {
	/// Channel endpoint for relays running in the frame `sender` describes.
	pub fn handle(&self, sender: MessageSender) -> BackgroundHandle {
		BackgroundHandle {
			tx: self.tx.clone(),
			sender,
		}
	}
}

/// A relay's end of the privileged channel, bound to its sender.
#[derive(Clone)]
pub struct BackgroundHandle {
	tx: mpsc::UnboundedSender<Dispatch>,
	sender: MessageSender,
}

#[async_trait]
impl PrivilegedChannel for BackgroundHandle {
	async fn call(&self, envelope: RequestEnvelope) -> wb_runtime::Result<Value> {
		let (reply, rx) = oneshot::channel();
		let request = InboundRequest {
			envelope,
			sender: self.sender.clone(),
		};
		self.tx.send(Dispatch { request, reply }).map_err(|_| wb_runtime::Error::ChannelClosed)?;
		rx.await.map_err(|_| wb_runtime::Error::ChannelClosed)
	}
}

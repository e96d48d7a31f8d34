//! In-memory doubles for exercising the orchestrator without a browser.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use wb_protocol::{PopupRequest, ResponseKind, WalletError, WalletNotice};

use crate::background::popup_window::parse_launch_url;
use crate::background::{IconState, Orchestrator, Platform, PopupSpec, TabId, TabInfo, WindowBounds, WindowId};
use crate::error::{Error, Result};
use crate::popup::{self, Decision, PopupController};

const FIRST_POPUP_WINDOW: WindowId = 1000;
const POPUP_EVENT_CAPACITY: usize = 64;

/// Scriptable [`Platform`] recording every call.
///
/// Popup windows get ids from 1000 upwards. Requests reaching a popup, either
/// through its launch URL or through `send_to_popup`, are broadcast to
/// [`FakePlatform::popup_requests`] subscribers.
pub struct FakePlatform {
	tabs: Mutex<BTreeMap<TabId, TabInfo>>,
	windows: Mutex<BTreeMap<WindowId, WindowBounds>>,
	next_window: AtomicU64,
	created: Mutex<Vec<(WindowId, PopupSpec)>>,
	sent: Mutex<Vec<(WindowId, PopupRequest)>>,
	icons: Mutex<HashMap<TabId, IconState>>,
	badge: Mutex<String>,
	notices: Mutex<Vec<(TabId, WalletNotice)>>,
	popup_tx: broadcast::Sender<PopupRequest>,
}

impl Default for FakePlatform {
	fn default() -> Self {
		Self::new()
	}
}

impl FakePlatform {
	pub fn new() -> Self {
		let (popup_tx, _) = broadcast::channel(POPUP_EVENT_CAPACITY);
		Self {
			tabs: Mutex::new(BTreeMap::new()),
			windows: Mutex::new(BTreeMap::new()),
			next_window: AtomicU64::new(FIRST_POPUP_WINDOW),
			created: Mutex::new(Vec::new()),
			sent: Mutex::new(Vec::new()),
			icons: Mutex::new(HashMap::new()),
			badge: Mutex::new(String::new()),
			notices: Mutex::new(Vec::new()),
			popup_tx,
		}
	}

	/// Adds a browser window with default bounds.
	pub fn add_window(&self, window_id: WindowId) {
		self.windows.lock().insert(
			window_id,
			WindowBounds {
				left: 0,
				top: 0,
				width: 1280,
				height: 800,
			},
		);
	}

	/// Adds an active tab in `window_id` showing `url`.
	pub fn add_tab(&self, tab_id: TabId, window_id: WindowId, url: &str) -> TabInfo {
		let tab = TabInfo {
			id: tab_id,
			window_id,
			url: url.to_string(),
			title: format!("Tab {tab_id}"),
			fav_icon_url: None,
			active: true,
		};
		self.tabs.lock().insert(tab_id, tab.clone());
		tab
	}

	/// Closes a window as the user would. The orchestrator is not told.
	pub fn close_window(&self, window_id: WindowId) {
		self.windows.lock().remove(&window_id);
	}

	pub fn popup_requests(&self) -> broadcast::Receiver<PopupRequest> {
		self.popup_tx.subscribe()
	}

	pub fn popups_created(&self) -> Vec<(WindowId, PopupSpec)> {
		self.created.lock().clone()
	}

	pub fn sent_to_popup(&self) -> Vec<(WindowId, PopupRequest)> {
		self.sent.lock().clone()
	}

	pub fn icon(&self, tab_id: TabId) -> Option<IconState> {
		self.icons.lock().get(&tab_id).copied()
	}

	pub fn badge(&self) -> String {
		self.badge.lock().clone()
	}

	pub fn notices(&self) -> Vec<(TabId, WalletNotice)> {
		self.notices.lock().clone()
	}
}

#[async_trait]
impl Platform for FakePlatform {
	async fn active_tabs(&self) -> Result<Vec<TabInfo>> {
		Ok(self.tabs.lock().values().filter(|tab| tab.active).cloned().collect())
	}

	async fn all_tabs(&self) -> Result<Vec<TabInfo>> {
		Ok(self.tabs.lock().values().cloned().collect())
	}

	async fn tab(&self, tab_id: TabId) -> Result<Option<TabInfo>> {
		Ok(self.tabs.lock().get(&tab_id).cloned())
	}

	async fn window_bounds(&self, window_id: WindowId) -> Result<Option<WindowBounds>> {
		Ok(self.windows.lock().get(&window_id).copied())
	}

	async fn create_popup(&self, spec: PopupSpec) -> Result<WindowId> {
		let request = parse_launch_url(&spec.url)?;
		let window_id = self.next_window.fetch_add(1, Ordering::SeqCst);
		self.windows.lock().insert(
			window_id,
			spec.bounds.unwrap_or(WindowBounds {
				left: 0,
				top: 0,
				width: spec.width,
				height: spec.height,
			}),
		);
		self.created.lock().push((window_id, spec));
		let _ = self.popup_tx.send(request);
		Ok(window_id)
	}

	async fn send_to_popup(&self, window_id: WindowId, request: &PopupRequest) -> Result<()> {
		if !self.windows.lock().contains_key(&window_id) {
			return Err(Error::Platform(format!("no window with id {window_id}")));
		}
		self.sent.lock().push((window_id, request.clone()));
		let _ = self.popup_tx.send(request.clone());
		Ok(())
	}

	async fn set_icon(&self, tab_id: TabId, state: IconState) -> Result<()> {
		self.icons.lock().insert(tab_id, state);
		Ok(())
	}

	async fn set_badge_text(&self, text: &str) -> Result<()> {
		*self.badge.lock() = text.to_string();
		Ok(())
	}

	async fn notify_tab(&self, tab_id: TabId, notice: &WalletNotice) -> Result<()> {
		self.notices.lock().push((tab_id, notice.clone()));
		Ok(())
	}
}

/// [`PopupController`] answering from a per-kind script.
///
/// Kinds without a script entry stay unanswered.
#[derive(Default)]
pub struct ScriptedPopup {
	script: Mutex<HashMap<ResponseKind, Decision>>,
	seen: Mutex<Vec<PopupRequest>>,
}

impl ScriptedPopup {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn approve(self, kind: ResponseKind, payload: Value) -> Self {
		self.script.lock().insert(kind, Decision::Approve(payload));
		self
	}

	pub fn reject(self, kind: ResponseKind, error: WalletError) -> Self {
		self.script.lock().insert(kind, Decision::Reject(error));
		self
	}

	/// Every request the popup was handed, in arrival order.
	pub fn seen(&self) -> Vec<PopupRequest> {
		self.seen.lock().clone()
	}

	/// Answers popup requests from `platform` into `orchestrator` until the
	/// task is aborted.
	pub fn attach(self: &Arc<Self>, platform: &FakePlatform, orchestrator: Arc<Orchestrator>) -> JoinHandle<()> {
		let mut requests = platform.popup_requests();
		let this = Arc::clone(self);
		tokio::spawn(async move {
			while let Ok(request) = requests.recv().await {
				match popup::resolve(this.as_ref(), request).await {
					Ok(Some(response)) => {
						orchestrator.deliver_popup_response(response);
					}
					Ok(None) => {}
					Err(e) => tracing::debug!(target = "wb.popup", error = %e, "scripted popup skipped request"),
				}
			}
		})
	}
}

#[async_trait]
impl PopupController for ScriptedPopup {
	async fn decide(&self, request: &PopupRequest) -> Option<Decision> {
		self.seen.lock().push(request.clone());
		let kind = request.request.kind.response_kind()?;
		self.script.lock().get(&kind).cloned()
	}
}

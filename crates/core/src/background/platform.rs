//! Browser primitives the orchestrator depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wb_protocol::{PopupRequest, TabDescriptor, WalletNotice, normalize_host};

use crate::error::Result;

pub type TabId = u64;
pub type WindowId = u64;

/// Snapshot of a browser tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
	pub id: TabId,
	pub window_id: WindowId,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub title: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fav_icon_url: Option<String>,
	#[serde(default)]
	pub active: bool,
}

impl TabInfo {
	/// Lower-cased hostname of the tab URL, if it has one.
	pub fn host(&self) -> Option<String> {
		host_of(&self.url)
	}

	pub fn descriptor(&self) -> TabDescriptor {
		TabDescriptor {
			title: self.title.clone(),
			url: self.url.clone(),
			fav_icon_url: self.fav_icon_url.clone(),
		}
	}
}

/// Lower-cased hostname of `url`, if it parses and has one.
pub fn host_of(url: &str) -> Option<String> {
	url::Url::parse(url).ok()?.host_str().map(normalize_host)
}

/// Window geometry in screen pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
	pub left: i32,
	pub top: i32,
	pub width: u32,
	pub height: u32,
}

/// Parameters for opening the popup window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupSpec {
	pub url: String,
	pub bounds: Option<WindowBounds>,
	pub width: u32,
	pub height: u32,
}

/// The two toolbar icon states a tab can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconState {
	Connected,
	Default,
}

/// Tab, window and action primitives of the extension platform.
#[async_trait]
pub trait Platform: Send + Sync {
	/// Active tabs across all windows.
	async fn active_tabs(&self) -> Result<Vec<TabInfo>>;

	async fn all_tabs(&self) -> Result<Vec<TabInfo>>;

	async fn tab(&self, tab_id: TabId) -> Result<Option<TabInfo>>;

	/// Bounds of `window_id`, or `None` when it no longer exists.
	async fn window_bounds(&self, window_id: WindowId) -> Result<Option<WindowBounds>>;

	async fn create_popup(&self, spec: PopupSpec) -> Result<WindowId>;

	/// Delivers a live request to an already-open popup.
	async fn send_to_popup(&self, window_id: WindowId, request: &PopupRequest) -> Result<()>;

	async fn set_icon(&self, tab_id: TabId, state: IconState) -> Result<()>;

	/// Empty text clears the badge.
	async fn set_badge_text(&self, text: &str) -> Result<()>;

	/// Pushes a notice to the page in `tab_id`.
	async fn notify_tab(&self, tab_id: TabId, notice: &WalletNotice) -> Result<()>;
}

//! Multi-provider discovery (EIP-6963 style announce/request).

use std::sync::Arc;

use serde_json::{Value, json};
use wb_protocol::{Preferences, ProviderInfo};

use super::PageProvider;

/// Event the page listens on for announcements.
pub const ANNOUNCE_EVENT: &str = "eip6963:announceProvider";
/// Event a page dispatches to ask providers to announce again.
pub const REQUEST_EVENT: &str = "eip6963:requestProvider";

/// `{info, provider}` as broadcast to the page.
#[derive(Clone)]
pub struct Announcement {
	pub info: ProviderInfo,
	pub provider: Arc<PageProvider>,
}

impl Announcement {
	/// The serializable part of the announcement; `provider` is a live reference.
	pub fn detail(&self) -> Value {
		json!({ "info": self.info })
	}
}

/// The page globals discovery writes to.
pub trait PageGlobals: Send + Sync {
	fn dispatch_announcement(&self, announcement: Announcement);

	/// Installs `provider` as the page's default wallet object.
	fn set_default_provider(&self, provider: Arc<PageProvider>);
}

/// Announces one provider and answers re-announce requests.
pub struct Discovery {
	provider: Arc<PageProvider>,
	globals: Arc<dyn PageGlobals>,
}

impl Discovery {
	pub fn new(provider: Arc<PageProvider>, globals: Arc<dyn PageGlobals>) -> Self {
		Self { provider, globals }
	}

	/// Announces once, and claims the default slot when compatibility mode is on.
	pub fn install(&self, preferences: &Preferences) {
		self.announce();
		if preferences.compatibility_mode {
			tracing::debug!(target = "wb.page", "claiming default provider slot");
			self.globals.set_default_provider(Arc::clone(&self.provider));
		}
	}

	pub fn announce(&self) {
		self.globals.dispatch_announcement(Announcement {
			info: self.provider.info().clone(),
			provider: Arc::clone(&self.provider),
		});
	}

	/// Handles a page event; only [`REQUEST_EVENT`] triggers a re-announce.
	pub fn on_page_event(&self, event: &str) -> bool {
		if event != REQUEST_EVENT {
			return false;
		}
		self.announce();
		true
	}
}

//! Mutable orchestrator state: popup handle, focus and response listeners.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use wb_protocol::{PopupResponse, ResponseEnvelope, ResponseKind};

use super::platform::WindowId;

/// The single live popup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupHandle {
	pub window_id: WindowId,
	pub parent_window_id: Option<WindowId>,
}

/// A caller waiting for the popup to answer.
pub(crate) struct Listener {
	pub(crate) ticket: u64,
	pub(crate) kind: ResponseKind,
	pub(crate) window_id: Option<WindowId>,
	tx: oneshot::Sender<ResponseEnvelope>,
}

impl Listener {
	pub(crate) fn resolve(self, response: ResponseEnvelope) {
		let _ = self.tx.send(response);
	}
}

/// State owned by one orchestrator and mutated only through it.
#[derive(Default)]
pub struct OrchestratorState {
	popup: Option<PopupHandle>,
	focused_window: Option<WindowId>,
	listeners: Vec<Listener>,
	last_ticket: u64,
	messaging_ready: bool,
}

impl OrchestratorState {
	pub fn popup(&self) -> Option<PopupHandle> {
		self.popup
	}

	pub fn set_popup(&mut self, handle: PopupHandle) {
		self.popup = Some(handle);
	}

	/// Forgets the popup if it is `window_id`. Returns whether it was.
	pub fn clear_popup_if(&mut self, window_id: WindowId) -> bool {
		if self.popup.is_some_and(|p| p.window_id == window_id) {
			self.popup = None;
			return true;
		}
		false
	}

	pub fn focused_window(&self) -> Option<WindowId> {
		self.focused_window
	}

	pub fn set_focused_window(&mut self, window_id: WindowId) {
		self.focused_window = Some(window_id);
	}

	pub fn messaging_ready(&self) -> bool {
		self.messaging_ready
	}

	pub fn set_messaging_ready(&mut self) {
		self.messaging_ready = true;
	}

	pub fn next_ticket(&mut self) -> u64 {
		self.last_ticket += 1;
		self.last_ticket
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.len()
	}

	pub(crate) fn attach(&mut self, ticket: u64, kind: ResponseKind) -> oneshot::Receiver<ResponseEnvelope> {
		let (tx, rx) = oneshot::channel();
		self.listeners.push(Listener {
			ticket,
			kind,
			window_id: None,
			tx,
		});
		rx
	}

	pub(crate) fn bind_window(&mut self, ticket: u64, window_id: WindowId) {
		if let Some(listener) = self.listeners.iter_mut().find(|l| l.ticket == ticket) {
			listener.window_id = Some(window_id);
		}
	}

	pub(crate) fn detach(&mut self, ticket: u64) {
		self.listeners.retain(|l| l.ticket != ticket);
	}

	/// Removes and returns the listener a popup response belongs to.
	///
	/// A ticketed response goes to that ticket only and must match its kind;
	/// an unticketed one goes to the oldest listener of the same kind shown
	/// in the current popup. Listeners left behind by a closed window never
	/// receive unticketed answers.
	pub(crate) fn take_listener(&mut self, response: &PopupResponse) -> Option<Listener> {
		let kind = response.response.kind;
		let index = match response.ticket {
			Some(ticket) => self.listeners.iter().position(|l| l.ticket == ticket && l.kind == kind)?,
			None => {
				let window_id = self.popup?.window_id;
				self.listeners.iter().position(|l| l.kind == kind && l.window_id == Some(window_id))?
			}
		};
		Some(self.listeners.remove(index))
	}

	/// Removes every listener bound to `window_id`.
	pub(crate) fn take_window_listeners(&mut self, window_id: WindowId) -> Vec<Listener> {
		let (taken, kept): (Vec<Listener>, Vec<Listener>) = std::mem::take(&mut self.listeners).into_iter().partition(|l| l.window_id == Some(window_id));
		self.listeners = kept;
		taken
	}
}

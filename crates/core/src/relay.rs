//! Stateless forwarder between the page bus and the privileged channel.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wb_protocol::{BusMessage, InternalKind, InternalReply, Preferences, RequestEnvelope, ResponseEnvelope, ResponseKind, WalletError, WalletNotice};
use wb_runtime::{PrivilegedChannel, Transport, TransportParts};

/// Forwards page requests for one page host.
pub struct IsolatedRelay {
	page_host: String,
	channel: Arc<dyn PrivilegedChannel>,
}

impl IsolatedRelay {
	pub fn new(page_host: impl Into<String>, channel: Arc<dyn PrivilegedChannel>) -> Self {
		Self {
			page_host: page_host.into(),
			channel,
		}
	}

	pub fn page_host(&self) -> &str {
		&self.page_host
	}

	/// Forwards one envelope and returns what the page should see.
	///
	/// External kinds get the page host stamped on and always yield a
	/// response of the derived kind. Internal kinds are forwarded as-is and
	/// never echo.
	pub async fn forward(&self, mut envelope: RequestEnvelope) -> Option<ResponseEnvelope> {
		let Some(response_kind) = envelope.kind.response_kind() else {
			if let Err(e) = self.channel.call(envelope).await {
				debug!(target = "wb.relay", error = %e, "internal request failed");
			}
			return None;
		};

		envelope.stamp_origin(&self.page_host);
		let response = match self.channel.call(envelope).await {
			Ok(value) => validate(response_kind, value),
			Err(e) => {
				warn!(target = "wb.relay", kind = response_kind.as_str(), error = %e, "privileged channel failed");
				None
			}
		};
		Some(response.unwrap_or_else(|| ResponseEnvelope::failure(response_kind, WalletError::UnexpectedResponse.message())))
	}

	/// Reads user preferences; defaults when the background cannot answer.
	pub async fn fetch_preferences(&self) -> Preferences {
		let reply = match self.channel.call(RequestEnvelope::new(InternalKind::GetPreferences, Vec::new())).await {
			Ok(value) => serde_json::from_value::<InternalReply>(value).ok(),
			Err(e) => {
				debug!(target = "wb.relay", error = %e, "preferences unavailable");
				None
			}
		};
		reply
			.and_then(|reply| reply.payload)
			.and_then(|payload| serde_json::from_value(payload).ok())
			.unwrap_or_default()
	}

	/// Serves the page end of `parts` until it closes.
	pub fn serve(self: Arc<Self>, parts: TransportParts) -> RelayHandle {
		let TransportParts {
			sender,
			receiver,
			mut message_rx,
		} = parts;
		let sender = Arc::new(Mutex::new(sender));

		let pump = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				warn!(target = "wb.relay", error = %e, "page transport error");
			}
		});

		let outbound = Arc::clone(&sender);
		let task = tokio::spawn(async move {
			while let Some(value) = message_rx.recv().await {
				let (id, envelope) = match serde_json::from_value::<BusMessage>(value) {
					Ok(BusMessage::Request { id, envelope }) => (id, envelope),
					Ok(other) => {
						debug!(target = "wb.relay", message = ?other, "ignoring non-request from page");
						continue;
					}
					Err(e) => {
						warn!(target = "wb.relay", error = %e, "unparseable page message");
						continue;
					}
				};
				let relay = Arc::clone(&self);
				let outbound = Arc::clone(&outbound);
				tokio::spawn(async move {
					if let Some(response) = relay.forward(envelope).await {
						if let Err(e) = send(&outbound, BusMessage::Response { id, response }).await {
							debug!(target = "wb.relay", id, error = %e, "page went away before response");
						}
					}
				});
			}
			pump.abort();
		});

		RelayHandle { sender, task }
	}
}

/// Accepts only a well-formed envelope of the expected kind.
fn validate(expected: ResponseKind, value: Value) -> Option<ResponseEnvelope> {
	let response: ResponseEnvelope = match serde_json::from_value(value) {
		Ok(response) => response,
		Err(e) => {
			warn!(target = "wb.relay", error = %e, "malformed response from background");
			return None;
		}
	};
	(response.kind == expected && response.is_well_formed()).then_some(response)
}

async fn send(sender: &Mutex<Box<dyn Transport>>, message: BusMessage) -> wb_runtime::Result<()> {
	let value = serde_json::to_value(message)?;
	sender.lock().await.send(value).await
}

/// A running relay; pushes background notices to its page.
pub struct RelayHandle {
	sender: Arc<Mutex<Box<dyn Transport>>>,
	task: JoinHandle<()>,
}

impl RelayHandle {
	pub async fn forward_notice(&self, notice: WalletNotice) -> wb_runtime::Result<()> {
		send(&self.sender, BusMessage::Notice { notice }).await
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	pub fn abort(&self) {
		self.task.abort();
	}
}

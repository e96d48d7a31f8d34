//! Fake transport for unit testing correlation and notice dispatch.
//!
//! Provides an in-memory transport for exercising the page connection
//! without a relay or background on the other end.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Arc::new(Connection::new(parts));
//!
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let fut = connection.send_request(RequestEnvelope::new(ExternalKind::Account, vec![]));
//! controller.inject_response(0, ResponseEnvelope::success(ResponseKind::Account, json!({})));
//! let response = fut.await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use wb_protocol::{BusMessage, ResponseEnvelope, WalletNotice};

use crate::error::Result;
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Builder for creating fake transport instances.
#[derive(Default)]
pub struct FakeTransportBuilder {}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self {}
	}

	/// Builds the fake transport and returns both parts and a controller.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));

		let parts = TransportParts {
			sender: Box::new(FakeTransportSender { sent: Arc::clone(&sent) }),
			receiver: Box::new(FakeTransportReceiver { inbound_rx, message_tx }),
			message_rx,
		};
		let controller = FakeTransportController { inbound_tx, sent };
		(parts, controller)
	}
}

/// Controller for injecting responses/notices and inspecting sent messages.
#[derive(Clone)]
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Value>,
	sent: Arc<Mutex<Vec<Value>>>,
}

impl FakeTransportController {
	/// Injects a raw JSON message as if it arrived from the relay.
	pub fn inject(&self, message: Value) {
		let _ = self.inbound_tx.send(message);
	}

	pub fn inject_response(&self, id: u64, response: ResponseEnvelope) {
		self.inject_message(BusMessage::Response { id, response });
	}

	pub fn inject_notice(&self, notice: WalletNotice) {
		self.inject_message(BusMessage::Notice { notice });
	}

	fn inject_message(&self, message: BusMessage) {
		if let Ok(value) = serde_json::to_value(message) {
			self.inject(value);
		}
	}

	/// Takes all sent messages, clearing the buffer.
	pub async fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.sent.lock().await)
	}

	/// Number of messages sent so far.
	pub async fn sent_count(&self) -> usize {
		self.sent.lock().await.len()
	}
}

struct FakeTransportSender {
	sent: Arc<Mutex<Vec<Value>>>,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let sent = Arc::clone(&self.sent);
		Box::pin(async move {
			sent.lock().await.push(message);
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Value>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}

//! Page-side connection: request/response correlation over the local bus.
//!
//! # Message Flow
//!
//! 1. Caller invokes `send_request()` with an envelope
//! 2. Connection assigns the next id and parks a oneshot sender
//! 3. A [`BusMessage::Request`] is serialized and sent via the transport
//! 4. The dispatch loop receives [`BusMessage::Response`] with the same id
//! 5. The parked sender is completed and the caller resumes
//!
//! [`BusMessage::Notice`] values carry no id and fan out to notice
//! subscribers instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use wb_protocol::{BusMessage, RequestEnvelope, ResponseEnvelope, WalletNotice};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

const NOTICE_CAPACITY: usize = 32;

/// Id-correlated connection from the page to the relay.
///
/// Shareable across tasks behind an `Arc`. Ids are sequential per
/// connection; responses for ids nobody waits on are dropped.
pub struct Connection {
	last_id: AtomicU64,
	callbacks: Arc<Mutex<HashMap<u64, oneshot::Sender<ResponseEnvelope>>>>,
	sender: Arc<Mutex<Box<dyn Transport>>>,
	receiver: Mutex<Option<Box<dyn TransportReceiver>>>,
	message_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
	notices: broadcast::Sender<WalletNotice>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
		Self {
			last_id: AtomicU64::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			sender: Arc::new(Mutex::new(parts.sender)),
			receiver: Mutex::new(Some(parts.receiver)),
			message_rx: Mutex::new(Some(parts.message_rx)),
			notices,
		}
	}

	/// Sends `envelope` and waits for the response carrying the same id.
	pub async fn send_request(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().await.insert(id, tx);

		if let Err(err) = self.write(id, envelope).await {
			self.callbacks.lock().await.remove(&id);
			return Err(err);
		}

		rx.await.map_err(|_| Error::ChannelClosed)
	}

	/// Sends `envelope` without waiting for an answer.
	pub async fn post(&self, envelope: RequestEnvelope) -> Result<u64> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		self.write(id, envelope).await?;
		Ok(id)
	}

	/// Subscribes to background notices.
	pub fn subscribe_notices(&self) -> broadcast::Receiver<WalletNotice> {
		self.notices.subscribe()
	}

	async fn write(&self, id: u64, envelope: RequestEnvelope) -> Result<()> {
		let message = serde_json::to_value(BusMessage::Request { id, envelope })?;
		self.sender.lock().await.send(message).await
	}

	/// Runs the dispatch loop until the transport closes.
	///
	/// Pending requests fail with [`Error::ChannelClosed`] once the loop ends.
	pub async fn run(&self) {
		let Some(receiver) = self.receiver.lock().await.take() else {
			tracing::warn!(target = "wb.runtime", "connection loop already running");
			return;
		};
		let Some(mut message_rx) = self.message_rx.lock().await.take() else {
			return;
		};

		let pump = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::error!(target = "wb.runtime", error = %e, "transport error");
			}
		});

		while let Some(value) = message_rx.recv().await {
			match serde_json::from_value::<BusMessage>(value.clone()) {
				Ok(message) => {
					if let Err(e) = self.dispatch(message).await {
						tracing::debug!(target = "wb.runtime", error = %e, "dropped message");
					}
				}
				Err(e) => {
					tracing::error!(target = "wb.runtime", error = %e, message = %value, "failed to parse bus message");
				}
			}
		}

		tracing::debug!(target = "wb.runtime", "message loop ended (transport closed)");
		self.callbacks.lock().await.clear();
		let _ = pump.await;
	}

	async fn dispatch(&self, message: BusMessage) -> Result<()> {
		match message {
			BusMessage::Response { id, response } => {
				let callback = self
					.callbacks
					.lock()
					.await
					.remove(&id)
					.ok_or_else(|| Error::ProtocolError(format!("Cannot find request to respond: id={id}")))?;
				let _ = callback.send(response);
				Ok(())
			}
			BusMessage::Notice { notice } => {
				let _ = self.notices.send(notice);
				Ok(())
			}
			BusMessage::Request { id, .. } => Err(Error::ProtocolError(format!("unexpected request on page side: id={id}"))),
		}
	}
}

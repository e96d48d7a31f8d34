//! Transport abstraction between two contexts.
//!
//! A transport is split into a sending half, a receiving half that pumps
//! inbound messages into `message_rx`, and the receiver of that pump. The
//! concrete medium (page event bus, extension port, in-memory pipe) stays
//! behind these traits.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Sending half of a transport.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receiving half; runs until the medium closes.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Everything a connection needs from a transport.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Creates two in-memory transports wired to each other.
///
/// Whatever one side sends arrives on the other side's `message_rx` once its
/// receiver is running.
pub fn memory_pair() -> (TransportParts, TransportParts) {
	let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
	let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();
	(half(a_to_b_tx, b_to_a_rx), half(b_to_a_tx, a_to_b_rx))
}

fn half(outbound: mpsc::UnboundedSender<Value>, inbound_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
	let (message_tx, message_rx) = mpsc::unbounded_channel();
	TransportParts {
		sender: Box::new(ChannelSender { outbound }),
		receiver: Box::new(ChannelReceiver { inbound_rx, message_tx }),
		message_rx,
	}
}

struct ChannelSender {
	outbound: mpsc::UnboundedSender<Value>,
}

impl Transport for ChannelSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let result = self.outbound.send(message).map_err(|_| Error::ChannelClosed);
		Box::pin(async move { result })
	}
}

struct ChannelReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Value>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for ChannelReceiver {
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

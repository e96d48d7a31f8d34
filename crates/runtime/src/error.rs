//! Error types for transports and the page connection.

/// Result alias used across the runtime crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The other side of a channel went away before answering.
	#[error("channel closed")]
	ChannelClosed,

	#[error("transport error: {0}")]
	Transport(String),

	#[error("protocol error: {0}")]
	ProtocolError(String),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn is_channel_closed(&self) -> bool {
		matches!(self, Error::ChannelClosed)
	}
}

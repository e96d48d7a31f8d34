//! Error types for the background, store and relay.

use wb_protocol::WalletError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("storage error: {0}")]
	Storage(String),

	#[error("platform error: {0}")]
	Platform(String),

	#[error("config error: {0}")]
	Config(String),

	/// The popup flow was driven out of order.
	#[error("popup error: {0}")]
	Popup(String),

	/// A wallet condition raised while handling a request.
	#[error(transparent)]
	Wallet(#[from] WalletError),

	#[error("background channel closed")]
	ChannelClosed,

	#[error(transparent)]
	Runtime(#[from] wb_runtime::Error),

	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Message placed into an error envelope when this error ends a request.
	pub fn envelope_message(&self) -> String {
		match self {
			Error::Wallet(wallet) => wallet.message().to_string(),
			other => other.to_string(),
		}
	}
}

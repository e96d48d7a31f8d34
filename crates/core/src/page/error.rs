use serde::{Deserialize, Serialize};
use wb_protocol::{ProviderErrorCode, WalletError};

/// The only error shape page callers ever see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({})", .code.code())]
pub struct ProviderError {
	pub code: ProviderErrorCode,
	pub message: String,
}

impl ProviderError {
	pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}

	/// Classifies an error string that crossed the channel.
	///
	/// Known condition texts keep their code; anything else is unexpected.
	pub fn from_message(message: &str) -> Self {
		match WalletError::from_message(message) {
			Some(error) => error.into(),
			None => Self::new(ProviderErrorCode::UnexpectedResponse, message),
		}
	}

	pub fn unexpected() -> Self {
		WalletError::UnexpectedResponse.into()
	}

	pub fn is(&self, error: WalletError) -> bool {
		self.code == error.code() && self.message == error.message()
	}
}

impl From<WalletError> for ProviderError {
	fn from(error: WalletError) -> Self {
		Self::new(error.code(), error.message())
	}
}

impl From<wb_runtime::Error> for ProviderError {
	fn from(error: wb_runtime::Error) -> Self {
		if error.is_channel_closed() {
			WalletError::Disconnected.into()
		} else {
			Self::new(ProviderErrorCode::UnexpectedResponse, error.to_string())
		}
	}
}

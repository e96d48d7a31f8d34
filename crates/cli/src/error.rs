use serde_json::{Value, json};
use thiserror::Error;
use wb::ProviderError;

use crate::output::ErrorCode;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error("no record for origin {0}")]
	NotFound(String),

	#[error("request failed: {0}")]
	Request(ProviderError),

	#[error("no answer within {0}ms")]
	Timeout(u64),

	#[error(transparent)]
	Bridge(#[from] wb::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::InvalidInput(_) | CliError::Json(_) => ErrorCode::InvalidInput,
			CliError::NotFound(_) => ErrorCode::NotFound,
			CliError::Request(_) => ErrorCode::RequestFailed,
			CliError::Timeout(_) => ErrorCode::Timeout,
			CliError::Bridge(err) => bridge_code(err),
			CliError::Anyhow(err) => err.downcast_ref::<wb::Error>().map_or(ErrorCode::InternalError, bridge_code),
		}
	}

	/// Structured details for the result envelope, when there are any.
	pub fn details(&self) -> Value {
		match self {
			CliError::Request(err) => json!(err),
			CliError::NotFound(origin) => json!({ "origin": origin }),
			_ => Value::Null,
		}
	}
}

impl From<ProviderError> for CliError {
	fn from(err: ProviderError) -> Self {
		CliError::Request(err)
	}
}

fn bridge_code(err: &wb::Error) -> ErrorCode {
	match err {
		wb::Error::Config(_) => ErrorCode::ConfigError,
		wb::Error::Storage(_) | wb::Error::Io(_) => ErrorCode::StorageError,
		_ => ErrorCode::InternalError,
	}
}

#[cfg(test)]
mod tests {
	use anyhow::Context as _;
	use wb::protocol::WalletError;

	use super::*;

	#[test]
	fn wrapped_config_errors_keep_their_code() {
		let wrapped: anyhow::Result<()> = Err(wb::Error::Config("bad json".into())).context("loading config.json");
		let err = CliError::from(wrapped.unwrap_err());
		assert_eq!(err.code(), ErrorCode::ConfigError);
	}

	#[test]
	fn request_failures_carry_provider_error() {
		let err = CliError::from(ProviderError::from(WalletError::UserRejected));
		assert_eq!(err.code(), ErrorCode::RequestFailed);
		assert_eq!(err.details()["code"], 4001);
	}
}

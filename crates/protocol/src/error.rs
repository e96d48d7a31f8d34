//! Closed error taxonomy shared by every context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric codes surfaced to page callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
	UserRejected,
	NotImplemented,
	Disconnected,
	/// Catch-all for anything the page cannot classify.
	UnexpectedResponse,
}

impl ProviderErrorCode {
	pub const fn code(self) -> i64 {
		match self {
			ProviderErrorCode::UserRejected => 4001,
			ProviderErrorCode::NotImplemented => 4200,
			ProviderErrorCode::Disconnected => 4900,
			ProviderErrorCode::UnexpectedResponse => -32603,
		}
	}

	pub const fn from_code(code: i64) -> Option<Self> {
		match code {
			4001 => Some(ProviderErrorCode::UserRejected),
			4200 => Some(ProviderErrorCode::NotImplemented),
			4900 => Some(ProviderErrorCode::Disconnected),
			-32603 => Some(ProviderErrorCode::UnexpectedResponse),
			_ => None,
		}
	}
}

impl Serialize for ProviderErrorCode {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i64(self.code())
	}
}

impl<'de> Deserialize<'de> for ProviderErrorCode {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let code = i64::deserialize(deserializer)?;
		Ok(ProviderErrorCode::from_code(code).unwrap_or(ProviderErrorCode::UnexpectedResponse))
	}
}

/// Named failure conditions, carried across the channel as message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletError {
	UserRejected,
	NotImplemented,
	Disconnected,
	NotConnected,
	ChainNotSupported,
	InvalidSwitchChainParams,
	InvalidTransactionParams,
	InvalidSignatureParams,
	UnsupportedPermission,
	UnsupportedRequestKind,
	MismatchedAccount,
	MismatchedChain,
	UnexpectedResponse,
}

impl WalletError {
	const ALL: [WalletError; 13] = [
		WalletError::UserRejected,
		WalletError::NotImplemented,
		WalletError::Disconnected,
		WalletError::NotConnected,
		WalletError::ChainNotSupported,
		WalletError::InvalidSwitchChainParams,
		WalletError::InvalidTransactionParams,
		WalletError::InvalidSignatureParams,
		WalletError::UnsupportedPermission,
		WalletError::UnsupportedRequestKind,
		WalletError::MismatchedAccount,
		WalletError::MismatchedChain,
		WalletError::UnexpectedResponse,
	];

	pub const fn message(self) -> &'static str {
		match self {
			WalletError::UserRejected => "user rejected the request",
			WalletError::NotImplemented => "method not implemented",
			WalletError::Disconnected => "wallet is disconnected",
			WalletError::NotConnected => "wallet is not connected",
			WalletError::ChainNotSupported => "chain not supported",
			WalletError::InvalidSwitchChainParams => "invalid switch chain parameters",
			WalletError::InvalidTransactionParams => "invalid transaction parameters",
			WalletError::InvalidSignatureParams => "invalid signature parameters",
			WalletError::UnsupportedPermission => "unsupported permission",
			WalletError::UnsupportedRequestKind => "unsupported request kind",
			WalletError::MismatchedAccount => "account does not match the connected account",
			WalletError::MismatchedChain => "inputs target different chains",
			WalletError::UnexpectedResponse => "unexpected response format",
		}
	}

	pub const fn code(self) -> ProviderErrorCode {
		match self {
			WalletError::UserRejected => ProviderErrorCode::UserRejected,
			WalletError::NotImplemented | WalletError::UnsupportedRequestKind | WalletError::UnsupportedPermission | WalletError::ChainNotSupported => {
				ProviderErrorCode::NotImplemented
			}
			WalletError::Disconnected | WalletError::NotConnected => ProviderErrorCode::Disconnected,
			WalletError::InvalidSwitchChainParams
			| WalletError::InvalidTransactionParams
			| WalletError::InvalidSignatureParams
			| WalletError::MismatchedAccount
			| WalletError::MismatchedChain
			| WalletError::UnexpectedResponse => ProviderErrorCode::UnexpectedResponse,
		}
	}

	/// Recognizes a condition from its message text.
	pub fn from_message(message: &str) -> Option<Self> {
		let message = message.trim();
		WalletError::ALL.into_iter().find(|error| error.message().eq_ignore_ascii_case(message))
	}
}

impl fmt::Display for WalletError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.message())
	}
}

impl std::error::Error for WalletError {}

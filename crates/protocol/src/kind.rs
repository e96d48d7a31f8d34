//! Closed request/response kind vocabulary.
//!
//! Every kind travels as a camelCase string ending in `Request` or
//! `Response`. External kinds (page-originated) each own exactly one
//! response kind; both enums are generated from one table so the pairing
//! cannot drift.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const REQUEST_SUFFIX: &str = "Request";
const RESPONSE_SUFFIX: &str = "Response";

/// Failure to resolve a wire string against the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KindError {
	/// The string names no known kind.
	#[error("unknown message kind: {0}")]
	Unknown(String),
	/// The kind is internal and therefore has no response kind.
	#[error("internal kind has no response: {0}")]
	NoResponse(String),
}

macro_rules! kind_table {
	(
		external { $( $(#[$emeta:meta])* $ext:ident = $estem:literal, )+ }
		internal { $( $(#[$imeta:meta])* $int:ident = $istem:literal, )+ }
	) => {
		/// Page-originated request kinds.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub enum ExternalKind {
			$( $(#[$emeta])* $ext, )+
		}

		/// Response kinds, one per [`ExternalKind`].
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub enum ResponseKind {
			$( $(#[$emeta])* $ext, )+
		}

		/// Extension-originated request kinds. These never echo back to a page.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub enum InternalKind {
			$( $(#[$imeta])* $int, )+
		}

		impl ExternalKind {
			pub const ALL: &'static [ExternalKind] = &[$(ExternalKind::$ext),+];

			/// Wire name, e.g. `accountRequest`.
			pub const fn as_str(self) -> &'static str {
				match self {
					$( ExternalKind::$ext => concat!($estem, "Request"), )+
				}
			}

			/// The unique response kind answering this request.
			pub const fn response_kind(self) -> ResponseKind {
				match self {
					$( ExternalKind::$ext => ResponseKind::$ext, )+
				}
			}

			fn from_stem(stem: &str) -> Option<Self> {
				match stem {
					$( $estem => Some(ExternalKind::$ext), )+
					_ => None,
				}
			}
		}

		impl ResponseKind {
			pub const ALL: &'static [ResponseKind] = &[$(ResponseKind::$ext),+];

			/// Wire name, e.g. `accountResponse`.
			pub const fn as_str(self) -> &'static str {
				match self {
					$( ResponseKind::$ext => concat!($estem, "Response"), )+
				}
			}

			/// The request kind this response answers.
			pub const fn request_kind(self) -> ExternalKind {
				match self {
					$( ResponseKind::$ext => ExternalKind::$ext, )+
				}
			}
		}

		impl InternalKind {
			pub const ALL: &'static [InternalKind] = &[$(InternalKind::$int),+];

			pub const fn as_str(self) -> &'static str {
				match self {
					$( InternalKind::$int => concat!($istem, "Request"), )+
				}
			}

			fn from_stem(stem: &str) -> Option<Self> {
				match stem {
					$( $istem => Some(InternalKind::$int), )+
					_ => None,
				}
			}
		}
	};
}

kind_table! {
	external {
		/// Query the connected account for the calling origin.
		Account = "account",
		/// Query the connected chain id.
		ChainId = "chainId",
		/// EIP-2255 permission request.
		RequestPermissions = "requestPermissions",
		/// Interactive account selection (connect).
		SelectAccount = "selectAccount",
		SignMessage = "signMessage",
		SignTypedMessage = "signTypedMessage",
		SendTransaction = "sendTransaction",
		SwitchChain = "switchChain",
		/// Idle signal asking the popup to close.
		CloseWindow = "closeWindow",
	}
	internal {
		/// Read user preferences.
		GetPreferences = "getPreferences",
		/// Set the toolbar badge count.
		SetBadgeCount = "setBadgeCount",
		/// Messaging listener is ready for hookup.
		MessagingReady = "messagingReady",
		/// Re-evaluate the icon state of every open tab.
		RefreshIcons = "refreshIcons",
		/// Read the most recently focused window id.
		FocusedWindow = "focusedWindow",
	}
}

impl ExternalKind {
	/// Kinds whose successful payload carries `address`/`chainId`.
	pub const fn is_account_bearing(self) -> bool {
		matches!(
			self,
			ExternalKind::Account | ExternalKind::ChainId | ExternalKind::RequestPermissions | ExternalKind::SelectAccount | ExternalKind::SwitchChain
		)
	}
}

/// Any request kind, external or internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
	External(ExternalKind),
	Internal(InternalKind),
}

impl RequestKind {
	/// Every registered request kind.
	pub fn all() -> impl Iterator<Item = RequestKind> {
		ExternalKind::ALL
			.iter()
			.copied()
			.map(RequestKind::External)
			.chain(InternalKind::ALL.iter().copied().map(RequestKind::Internal))
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			RequestKind::External(kind) => kind.as_str(),
			RequestKind::Internal(kind) => kind.as_str(),
		}
	}

	pub const fn is_external(self) -> bool {
		matches!(self, RequestKind::External(_))
	}

	/// Response kind for external kinds, `None` for internal ones.
	pub const fn response_kind(self) -> Option<ResponseKind> {
		match self {
			RequestKind::External(kind) => Some(kind.response_kind()),
			RequestKind::Internal(_) => None,
		}
	}
}

impl From<ExternalKind> for RequestKind {
	fn from(kind: ExternalKind) -> Self {
		RequestKind::External(kind)
	}
}

impl From<InternalKind> for RequestKind {
	fn from(kind: InternalKind) -> Self {
		RequestKind::Internal(kind)
	}
}

/// Maps a request wire name to its response kind.
///
/// Fails for internal kinds and for anything outside the vocabulary.
pub fn response_kind_for(wire: &str) -> Result<ResponseKind, KindError> {
	match wire.parse::<RequestKind>()? {
		RequestKind::External(kind) => Ok(kind.response_kind()),
		RequestKind::Internal(_) => Err(KindError::NoResponse(wire.to_string())),
	}
}

impl FromStr for ExternalKind {
	type Err = KindError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.strip_suffix(REQUEST_SUFFIX)
			.and_then(ExternalKind::from_stem)
			.ok_or_else(|| KindError::Unknown(s.to_string()))
	}
}

impl FromStr for InternalKind {
	type Err = KindError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.strip_suffix(REQUEST_SUFFIX)
			.and_then(InternalKind::from_stem)
			.ok_or_else(|| KindError::Unknown(s.to_string()))
	}
}

impl FromStr for ResponseKind {
	type Err = KindError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.strip_suffix(RESPONSE_SUFFIX)
			.and_then(ExternalKind::from_stem)
			.map(ExternalKind::response_kind)
			.ok_or_else(|| KindError::Unknown(s.to_string()))
	}
}

impl FromStr for RequestKind {
	type Err = KindError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let Some(stem) = s.strip_suffix(REQUEST_SUFFIX) else {
			return Err(KindError::Unknown(s.to_string()));
		};
		ExternalKind::from_stem(stem)
			.map(RequestKind::External)
			.or_else(|| InternalKind::from_stem(stem).map(RequestKind::Internal))
			.ok_or_else(|| KindError::Unknown(s.to_string()))
	}
}

macro_rules! string_serde {
	($($ty:ty),+) => {
		$(
			impl fmt::Display for $ty {
				fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
					f.write_str(self.as_str())
				}
			}

			impl Serialize for $ty {
				fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
					serializer.serialize_str(self.as_str())
				}
			}

			impl<'de> Deserialize<'de> for $ty {
				fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
					let raw = String::deserialize(deserializer)?;
					raw.parse().map_err(D::Error::custom)
				}
			}
		)+
	};
}

string_serde!(ExternalKind, ResponseKind, InternalKind, RequestKind);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn response_kind_is_bijective() {
		for kind in ExternalKind::ALL {
			assert_eq!(kind.response_kind().request_kind(), *kind);
			let expected = kind.as_str().replace("Request", "Response");
			assert_eq!(kind.response_kind().as_str(), expected);
		}
		assert_eq!(ExternalKind::ALL.len(), ResponseKind::ALL.len());
	}

	#[test]
	fn response_kind_for_rejects_unknown_strings() {
		assert_eq!(response_kind_for("accountRequest"), Ok(ResponseKind::Account));
		assert!(matches!(response_kind_for("fooRequest"), Err(KindError::Unknown(_))));
		assert!(matches!(response_kind_for("account"), Err(KindError::Unknown(_))));
		assert!(matches!(response_kind_for("accountResponse"), Err(KindError::Unknown(_))));
		assert!(matches!(response_kind_for(""), Err(KindError::Unknown(_))));
	}

	#[test]
	fn internal_kinds_have_no_response() {
		assert!(matches!(response_kind_for("getPreferencesRequest"), Err(KindError::NoResponse(_))));
		for kind in InternalKind::ALL {
			assert_eq!(RequestKind::Internal(*kind).response_kind(), None);
		}
	}

	#[test]
	fn kind_errors_render_the_offending_string() {
		let err = "fooRequest".parse::<RequestKind>().unwrap_err();
		assert_eq!(err.to_string(), "unknown message kind: fooRequest");
		let err = response_kind_for("getPreferencesRequest").unwrap_err();
		assert_eq!(err.to_string(), "internal kind has no response: getPreferencesRequest");
		let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
		assert!(boxed.source().is_none());
	}

	#[test]
	fn wire_names_round_trip_through_serde() {
		let json = serde_json::to_string(&ExternalKind::SwitchChain).unwrap();
		assert_eq!(json, "\"switchChainRequest\"");
		let back: RequestKind = serde_json::from_str("\"setBadgeCountRequest\"").unwrap();
		assert_eq!(back, RequestKind::Internal(InternalKind::SetBadgeCount));
		assert!(serde_json::from_str::<ResponseKind>("\"bogusResponse\"").is_err());
	}

	#[test]
	fn registry_covers_both_scopes() {
		let all: Vec<_> = RequestKind::all().collect();
		assert_eq!(all.len(), ExternalKind::ALL.len() + InternalKind::ALL.len());
		assert!(all.iter().filter(|k| k.is_external()).count() == ExternalKind::ALL.len());
	}
}

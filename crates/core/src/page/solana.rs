//! Solana wallet-standard adapter over the same request primitive.
//!
//! Byte fields (messages, transactions, signatures) travel base64-encoded in
//! request params and response payloads.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use wb_protocol::{ExternalKind, SOLANA_FAMILY, WalletError};

use super::events::{EventEmitter, ListenerId, ProviderEvent};
use super::{PageProvider, ProviderError, ProviderResult};

pub const STANDARD_CONNECT: &str = "standard:connect";
pub const STANDARD_DISCONNECT: &str = "standard:disconnect";
pub const STANDARD_EVENTS: &str = "standard:events";
pub const SOLANA_SIGN_MESSAGE: &str = "solana:signMessage";
pub const SOLANA_SIGN_AND_SEND_TRANSACTION: &str = "solana:signAndSendTransaction";
pub const SOLANA_SIGN_IN: &str = "solana:signIn";

/// Every feature the adapter registers.
pub const FEATURES: &[&str] = &[
	STANDARD_CONNECT,
	STANDARD_DISCONNECT,
	STANDARD_EVENTS,
	SOLANA_SIGN_MESSAGE,
	SOLANA_SIGN_AND_SEND_TRANSACTION,
	SOLANA_SIGN_IN,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
	pub address: String,
	pub chains: Vec<String>,
	pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageInput {
	pub account: String,
	pub message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignMessageOutput {
	pub signed_message: Vec<u8>,
	pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
	pub account: String,
	/// `solana:<cluster>`
	pub chain: String,
	pub transaction: Vec<u8>,
}

/// Sign-In With Solana input; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInInput {
	pub domain: Option<String>,
	pub address: Option<String>,
	pub statement: Option<String>,
	pub nonce: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutput {
	pub account: WalletAccount,
	pub signed_message: Vec<u8>,
	pub signature: Vec<u8>,
}

/// Wallet-standard wallet backed by a [`PageProvider`].
pub struct SolanaWallet {
	provider: Arc<PageProvider>,
	chains: Vec<String>,
	accounts: Mutex<Vec<WalletAccount>>,
	events: EventEmitter,
}

impl SolanaWallet {
	pub fn new(provider: Arc<PageProvider>, chains: Vec<String>) -> Self {
		Self {
			provider,
			chains,
			accounts: Mutex::new(Vec::new()),
			events: EventEmitter::new(),
		}
	}

	pub fn features(&self) -> &'static [&'static str] {
		FEATURES
	}

	pub fn chains(&self) -> &[String] {
		&self.chains
	}

	pub fn accounts(&self) -> Vec<WalletAccount> {
		self.accounts.lock().clone()
	}

	/// `standard:connect`. A silent connect only reuses an existing authorization.
	pub async fn connect(&self, silent: bool) -> ProviderResult<Vec<WalletAccount>> {
		let kind = if silent { ExternalKind::Account } else { ExternalKind::SelectAccount };
		let payload = self.provider.request_uncached(kind, vec![json!(SOLANA_FAMILY)]).await;
		let payload = match payload {
			Ok(payload) => payload,
			Err(e) if silent && e.is(WalletError::NotConnected) => return Ok(Vec::new()),
			Err(e) => return Err(e),
		};
		let address = payload.get("address").and_then(Value::as_str).ok_or_else(ProviderError::unexpected)?;
		let account = self.account(address);
		let changed = {
			let mut accounts = self.accounts.lock();
			let changed = accounts.first() != Some(&account);
			*accounts = vec![account];
			changed
		};
		if changed {
			self.emit_change();
		}
		Ok(self.accounts())
	}

	/// `standard:disconnect`. Local only; the stored authorization is kept.
	pub fn disconnect(&self) {
		let had_accounts = !std::mem::take(&mut *self.accounts.lock()).is_empty();
		if had_accounts {
			self.emit_change();
		}
	}

	/// `standard:events` subscription to `change`.
	pub fn on_change(&self, callback: impl Fn(&Value) + Send + Sync + 'static) -> ListenerId {
		self.events.on(ProviderEvent::Change, callback)
	}

	pub fn off(&self, id: ListenerId) -> bool {
		self.events.remove_listener(id)
	}

	/// `solana:signMessage`. Every input must name the connected account.
	pub async fn sign_message(&self, inputs: &[SignMessageInput]) -> ProviderResult<Vec<SignMessageOutput>> {
		let address = self.connected_address()?;
		if inputs.iter().any(|input| input.account != address) {
			return Err(WalletError::MismatchedAccount.into());
		}
		let mut outputs = Vec::with_capacity(inputs.len());
		for input in inputs {
			let signature = self.sign_bytes(&address, &input.message).await?;
			outputs.push(SignMessageOutput {
				signed_message: input.message.clone(),
				signature,
			});
		}
		Ok(outputs)
	}

	/// `solana:signAndSendTransaction`. Inputs must share the connected
	/// account and one supported chain.
	pub async fn sign_and_send_transaction(&self, inputs: &[TransactionInput]) -> ProviderResult<Vec<Vec<u8>>> {
		let address = self.connected_address()?;
		if inputs.iter().any(|input| input.account != address) {
			return Err(WalletError::MismatchedAccount.into());
		}
		if let Some(first) = inputs.first() {
			if inputs.iter().any(|input| input.chain != first.chain) {
				return Err(WalletError::MismatchedChain.into());
			}
			if !self.chains.contains(&first.chain) {
				return Err(WalletError::ChainNotSupported.into());
			}
		}

		let mut signatures = Vec::with_capacity(inputs.len());
		for input in inputs {
			let params = vec![
				json!({
					"transaction": STANDARD.encode(&input.transaction),
					"chain": input.chain,
					"from": address,
				}),
				json!(SOLANA_FAMILY),
			];
			let payload = self.provider.request_uncached(ExternalKind::SendTransaction, params).await?;
			signatures.push(decode_signature(&payload)?);
		}
		Ok(signatures)
	}

	/// `solana:signIn`. Connects first when needed.
	pub async fn sign_in(&self, input: SignInInput) -> ProviderResult<SignInOutput> {
		let existing = self.accounts.lock().first().cloned();
		let account = match existing {
			Some(account) => account,
			None => self.connect(false).await?.into_iter().next().ok_or_else(ProviderError::unexpected)?,
		};
		if input.address.as_ref().is_some_and(|requested| *requested != account.address) {
			return Err(WalletError::MismatchedAccount.into());
		}

		let message = sign_in_message(&input, &account.address).into_bytes();
		let signature = self.sign_bytes(&account.address, &message).await?;
		Ok(SignInOutput {
			account,
			signed_message: message,
			signature,
		})
	}

	async fn sign_bytes(&self, address: &str, message: &[u8]) -> ProviderResult<Vec<u8>> {
		let params = vec![json!(STANDARD.encode(message)), json!(address), json!(SOLANA_FAMILY)];
		let payload = self.provider.request_uncached(ExternalKind::SignMessage, params).await?;
		decode_signature(&payload)
	}

	fn connected_address(&self) -> ProviderResult<String> {
		self.accounts
			.lock()
			.first()
			.map(|account| account.address.clone())
			.ok_or_else(|| WalletError::NotConnected.into())
	}

	fn account(&self, address: &str) -> WalletAccount {
		WalletAccount {
			address: address.to_string(),
			chains: self.chains.clone(),
			features: FEATURES.iter().map(|f| f.to_string()).collect(),
		}
	}

	fn emit_change(&self) {
		let accounts = self.accounts();
		self.events.emit(ProviderEvent::Change, &json!({ "accounts": accounts }));
	}
}

/// Accepts `"<base64>"` or `{ "signature": "<base64>" }`.
fn decode_signature(payload: &Value) -> ProviderResult<Vec<u8>> {
	let encoded = payload
		.as_str()
		.or_else(|| payload.get("signature").and_then(Value::as_str))
		.ok_or_else(ProviderError::unexpected)?;
	STANDARD.decode(encoded).map_err(|_| ProviderError::unexpected())
}

/// Plain-text Sign-In With Solana message.
fn sign_in_message(input: &SignInInput, address: &str) -> String {
	let mut message = format!("{} wants you to sign in with your Solana account:\n{address}", input.domain.as_deref().unwrap_or("this site"));
	if let Some(statement) = &input.statement {
		message.push_str("\n\n");
		message.push_str(statement);
	}
	if let Some(nonce) = &input.nonce {
		message.push_str("\n\nNonce: ");
		message.push_str(nonce);
	}
	message
}

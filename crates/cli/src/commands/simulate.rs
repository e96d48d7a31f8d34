//! In-process round trip: page provider → relay → orchestrator → scripted popup.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wb::background::WindowId;
use wb::protocol::{ETH_ACCOUNTS_CAPABILITY, ExternalKind, WalletError, normalize_host};
use wb::testing::{FakePlatform, ScriptedPopup};
use wb::{ConnectionStore, IsolatedRelay, MessageSender, Orchestrator, PageProvider};

use crate::context::CommandContext;
use crate::error::{CliError, Result};

const PAGE_WINDOW: WindowId = 1;
const PAGE_TAB: u64 = 1;
/// Stand-in for a signature or transaction hash.
const SIGNATURE: &str = "0x5b1c0ffee5b1c0ffee5b1c0ffee5b1c0ffee5b1c0ffee5b1c0ffee5b1c0ffee5";

#[derive(Debug, Clone)]
pub struct SimulateOptions {
	pub method: String,
	pub params: String,
	pub origin: String,
	pub address: String,
	pub chain_id: Option<u64>,
	pub reject: bool,
	pub ephemeral: bool,
	pub timeout_ms: u64,
}

pub async fn execute(ctx: &CommandContext, options: SimulateOptions) -> Result<Value> {
	let params: Vec<Value> = serde_json::from_str(&options.params).map_err(|e| CliError::InvalidInput(format!("params must be a JSON array: {e}")))?;
	let origin = normalize_host(&options.origin);
	if origin.is_empty() {
		return Err(CliError::InvalidInput("origin must not be empty".into()));
	}

	let config = ctx.config()?;
	let chain_id = options.chain_id.unwrap_or(config.default_chain_id);
	let store = if options.ephemeral { ConnectionStore::in_memory() } else { ctx.store() };
	let page_url = format!("https://{origin}/");

	let platform = Arc::new(FakePlatform::new());
	platform.add_window(PAGE_WINDOW);
	platform.add_tab(PAGE_TAB, PAGE_WINDOW, &page_url);

	let orchestrator = Arc::new(Orchestrator::new(platform.clone(), store.clone(), config.clone()));
	let popup = Arc::new(script(options.reject, &options.address, chain_id));
	let driver = popup.attach(&platform, orchestrator.clone());

	let sender = MessageSender {
		tab_id: Some(PAGE_TAB),
		url: Some(page_url),
	};
	let relay = Arc::new(IsolatedRelay::new(origin.clone(), Arc::new(orchestrator.clone().spawn().handle(sender))));
	let (page_end, relay_end) = wb_runtime::memory_pair();
	let relay = relay.serve(relay_end);
	let provider = PageProvider::connect(page_end, config.provider.clone());

	tracing::info!(target = "wb", method = %options.method, %origin, "simulating request");
	let outcome = tokio::time::timeout(Duration::from_millis(options.timeout_ms), provider.request_method(&options.method, params)).await;
	driver.abort();
	relay.abort();

	let result = outcome.map_err(|_| CliError::Timeout(options.timeout_ms))??;
	let prompts: Vec<&str> = popup
		.seen()
		.iter()
		.filter_map(|request| request.request.external_kind())
		.filter(|kind| *kind != ExternalKind::CloseWindow)
		.map(ExternalKind::as_str)
		.collect();

	Ok(json!({
		"origin": origin,
		"method": options.method,
		"result": result,
		"popupsOpened": platform.popups_created().len(),
		"prompts": prompts,
		"record": store.get(&origin).await?,
	}))
}

/// Popup answering every interactive kind the same way.
fn script(reject: bool, address: &str, chain_id: u64) -> ScriptedPopup {
	ExternalKind::ALL
		.iter()
		.copied()
		.filter(|kind| *kind != ExternalKind::CloseWindow)
		.fold(ScriptedPopup::new(), |popup, kind| {
			let response_kind = kind.response_kind();
			if reject {
				return popup.reject(response_kind, WalletError::UserRejected);
			}
			popup.approve(response_kind, approval(kind, address, chain_id))
		})
}

fn approval(kind: ExternalKind, address: &str, chain_id: u64) -> Value {
	match kind {
		ExternalKind::ChainId => json!({ "chainId": chain_id }),
		ExternalKind::RequestPermissions => json!({
			"address": address,
			"chainId": chain_id,
			"permissions": [{ "parentCapability": ETH_ACCOUNTS_CAPABILITY }],
		}),
		ExternalKind::SignMessage | ExternalKind::SignTypedMessage | ExternalKind::SendTransaction => json!(SIGNATURE),
		_ => json!({ "address": address, "chainId": chain_id }),
	}
}

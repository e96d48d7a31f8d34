//! Page → relay → background round trips over in-memory transports.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wb::background::IconState;
use wb::protocol::{ExternalKind, ProviderErrorCode, ResponseKind, WalletError, WalletNotice};
use wb::testing::{FakePlatform, ScriptedPopup};
use wb::{BridgeConfig, ConnectionStore, IsolatedRelay, MessageSender, Orchestrator, PageProvider, ProviderEvent, RelayHandle};

struct Harness {
	platform: Arc<FakePlatform>,
	orchestrator: Arc<Orchestrator>,
	provider: Arc<PageProvider>,
	relay: RelayHandle,
	popup: Arc<ScriptedPopup>,
	_driver: JoinHandle<()>,
}

fn harness(popup: ScriptedPopup) -> Harness {
	let mut config = BridgeConfig::default();
	config.popup.reuse_grace_ms = 0;

	let platform = Arc::new(FakePlatform::new());
	platform.add_window(1);
	platform.add_tab(10, 1, "https://app.example/dapp");
	platform.add_tab(11, 1, "https://other.example/");

	let orchestrator = Arc::new(Orchestrator::new(platform.clone(), ConnectionStore::in_memory(), config.clone()));
	let popup = Arc::new(popup);
	let driver = popup.attach(&platform, orchestrator.clone());

	let channel = orchestrator.clone().spawn();
	let sender = MessageSender {
		tab_id: Some(10),
		url: Some("https://app.example/dapp".to_string()),
	};
	let relay = Arc::new(IsolatedRelay::new("app.example", Arc::new(channel.handle(sender))));
	let (page_end, relay_end) = wb_runtime::memory_pair();
	let relay = relay.serve(relay_end);
	let provider = PageProvider::connect(page_end, config.provider);

	Harness {
		platform,
		orchestrator,
		provider,
		relay,
		popup,
		_driver: driver,
	}
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
	for _ in 0..400 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("condition not met in time");
}

fn record(provider: &PageProvider, event: ProviderEvent) -> Arc<Mutex<Vec<Value>>> {
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	provider.on(event, move |value| sink.lock().push(value.clone()));
	seen
}

#[tokio::test]
async fn accounts_are_empty_before_connecting() {
	let h = harness(ScriptedPopup::new());

	let accounts = h.provider.request_method("eth_accounts", vec![]).await.unwrap();
	assert_eq!(accounts, json!([]));

	let chain = h.provider.request_method("eth_chainId", vec![]).await.unwrap();
	assert_eq!(chain, json!("0x1"));
	assert!(h.platform.popups_created().is_empty());
}

#[tokio::test]
async fn connect_persists_and_answers_from_cache() {
	let h = harness(ScriptedPopup::new().approve(ResponseKind::SelectAccount, json!({"address": "0xabc", "chainId": 1})));
	let accounts_changed = record(&h.provider, ProviderEvent::AccountsChanged);

	let accounts = h.provider.request_method("eth_requestAccounts", vec![]).await.unwrap();
	assert_eq!(accounts, json!(["0xabc"]));
	assert_eq!(accounts_changed.lock().clone(), vec![json!(["0xabc"])]);

	let stored = h.orchestrator.store().get("app.example").await.unwrap().unwrap();
	assert_eq!(stored.accounts, vec!["0xabc".to_string()]);
	assert_eq!(h.platform.icon(10), Some(IconState::Connected));
	assert_eq!(h.popup.seen()[0].source.url, "https://app.example/dapp");

	assert_eq!(h.provider.request_method("eth_accounts", vec![]).await.unwrap(), json!(["0xabc"]));
	assert_eq!(h.provider.request_method("net_version", vec![]).await.unwrap(), json!("1"));
	assert_eq!(h.platform.popups_created().len(), 1);
}

#[tokio::test]
async fn drained_queue_closes_the_popup() {
	let h = harness(ScriptedPopup::new().approve(ResponseKind::SelectAccount, json!({"address": "0xabc", "chainId": 1})));

	h.provider.request_method("eth_requestAccounts", vec![]).await.unwrap();

	let platform = h.platform.clone();
	wait_for(move || platform.sent_to_popup().iter().any(|(_, request)| request.request.external_kind() == Some(ExternalKind::CloseWindow))).await;
}

#[tokio::test]
async fn rejection_reaches_the_page_as_user_rejected() {
	let h = harness(
		ScriptedPopup::new()
			.approve(ResponseKind::SelectAccount, json!({"address": "0xabc", "chainId": 1}))
			.reject(ResponseKind::SignMessage, WalletError::UserRejected),
	);
	h.provider.request_method("eth_requestAccounts", vec![]).await.unwrap();

	let err = h.provider.request_method("personal_sign", vec![json!("0x68656c6c6f"), json!("0xabc")]).await.unwrap_err();
	assert_eq!(err.code, ProviderErrorCode::UserRejected);
	assert_eq!(err.message, "user rejected the request");
}

#[tokio::test]
async fn pushed_disconnect_clears_the_page_cache() {
	let h = harness(ScriptedPopup::new().approve(ResponseKind::SelectAccount, json!({"address": "0xabc", "chainId": 5})));
	let disconnects = record(&h.provider, ProviderEvent::Disconnect);
	h.provider.request_method("eth_requestAccounts", vec![]).await.unwrap();
	assert_eq!(h.provider.cached().address.as_deref(), Some("0xabc"));

	h.relay.forward_notice(WalletNotice::Disconnect).await.unwrap();

	let provider = h.provider.clone();
	wait_for(move || provider.cached().address.is_none()).await;
	assert_eq!(disconnects.lock().len(), 1);
	assert_eq!(disconnects.lock()[0]["code"], 4900);
}

#[tokio::test]
async fn pushed_chain_change_updates_the_page() {
	let h = harness(ScriptedPopup::new());
	let chains = record(&h.provider, ProviderEvent::ChainChanged);

	h.relay.forward_notice(WalletNotice::ChainChanged { chain_id: 137 }).await.unwrap();

	let seen = chains.clone();
	wait_for(move || !seen.lock().is_empty()).await;
	assert_eq!(chains.lock()[0], json!("0x89"));
	assert_eq!(h.provider.request_method("eth_chainId", vec![]).await.unwrap(), json!("0x89"));
}

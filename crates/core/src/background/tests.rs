use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wb_protocol::{
	ConnectionRecord, ConnectionUpdate, ExternalKind, InternalKind, InternalReply, PopupResponse, RequestEnvelope, ResponseEnvelope, ResponseKind, SOLANA_FAMILY, WalletNotice,
};

use super::*;
use crate::background::popup_window::parse_launch_url;
use crate::testing::{FakePlatform, ScriptedPopup};

const PARENT_WINDOW: WindowId = 1;

fn config() -> BridgeConfig {
	let mut config = BridgeConfig::default();
	config.popup.reuse_grace_ms = 0;
	config
}

fn setup_with(config: BridgeConfig) -> (Arc<FakePlatform>, Arc<Orchestrator>) {
	let platform = Arc::new(FakePlatform::new());
	platform.add_window(PARENT_WINDOW);
	platform.add_tab(10, PARENT_WINDOW, "https://app.example/dapp");
	platform.add_tab(11, PARENT_WINDOW, "https://app.example/other");
	platform.add_tab(12, PARENT_WINDOW, "https://other.example/");
	let orchestrator = Arc::new(Orchestrator::new(platform.clone(), ConnectionStore::in_memory(), config));
	(platform, orchestrator)
}

fn setup() -> (Arc<FakePlatform>, Arc<Orchestrator>) {
	setup_with(config())
}

fn external(kind: ExternalKind, params: Vec<Value>, host: &str) -> InboundRequest {
	let mut envelope = RequestEnvelope::new(kind, params);
	envelope.stamp_origin(host);
	InboundRequest {
		envelope,
		sender: MessageSender::default(),
	}
}

fn internal(kind: InternalKind, params: Vec<Value>) -> InboundRequest {
	InboundRequest {
		envelope: RequestEnvelope::new(kind, params),
		sender: MessageSender::default(),
	}
}

async fn call(orchestrator: &Orchestrator, request: InboundRequest) -> ResponseEnvelope {
	serde_json::from_value(orchestrator.handle(request).await).unwrap()
}

fn spawn_call(orchestrator: &Arc<Orchestrator>, request: InboundRequest) -> tokio::task::JoinHandle<ResponseEnvelope> {
	let orchestrator = Arc::clone(orchestrator);
	tokio::spawn(async move { call(&orchestrator, request).await })
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

fn created_ticket(platform: &FakePlatform, index: usize) -> u64 {
	let created = platform.popups_created();
	parse_launch_url(&created[index].1.url).unwrap().ticket
}

async fn seed(orchestrator: &Orchestrator, origin: &str, address: &str, chain_id: u64) {
	orchestrator
		.store()
		.merge(
			origin,
			ConnectionUpdate {
				accounts: Some(vec![address.to_string()]),
				chain_id: Some(chain_id),
				permissions: None,
			},
		)
		.await
		.unwrap();
}

#[tokio::test]
async fn scenario_a_account_query_without_record() {
	let (platform, orchestrator) = setup();

	let response = call(&orchestrator, external(ExternalKind::Account, vec![], "app.example")).await;

	assert_eq!(response.kind, ResponseKind::Account);
	assert_eq!(response.error.as_deref(), Some("wallet is not connected"));
	assert!(platform.popups_created().is_empty());
}

#[tokio::test]
async fn scenario_b_and_c_connect_then_query() {
	let (platform, orchestrator) = setup();
	let popup = Arc::new(ScriptedPopup::new().approve(ResponseKind::SelectAccount, json!({"address": "0xabc", "chainId": 1})));
	let _driver = popup.attach(&platform, orchestrator.clone());

	let response = call(&orchestrator, external(ExternalKind::SelectAccount, vec![], "app.example")).await;
	assert_eq!(response.payload, Some(json!({"address": "0xabc", "chainId": 1})));

	let created = platform.popups_created();
	assert_eq!(created.len(), 1);
	let bounds = created[0].1.bounds.unwrap();
	assert_eq!(bounds.left, 1280 - 400 - 20);
	assert_eq!(bounds.top, 80);
	assert_eq!(popup.seen()[0].source.url, "https://app.example/dapp");

	let record: ConnectionRecord = orchestrator.store().get("app.example").await.unwrap().unwrap();
	assert_eq!(record.accounts, vec!["0xabc".to_string()]);
	assert_eq!(record.chain_id, Some(1));
	assert!(record.timestamp > 0);

	assert_eq!(platform.icon(10), Some(IconState::Connected));
	assert_eq!(platform.icon(11), Some(IconState::Connected));
	assert_eq!(platform.icon(12), None);

	let response = call(&orchestrator, external(ExternalKind::Account, vec![], "app.example")).await;
	assert_eq!(response.payload, Some(json!({"address": "0xabc", "chainId": 1})));
	assert_eq!(platform.popups_created().len(), 1);
}

#[tokio::test]
async fn chain_id_query_is_always_answered() {
	let (platform, orchestrator) = setup();
	let response = call(&orchestrator, external(ExternalKind::ChainId, vec![], "unknown.example")).await;
	assert_eq!(response.payload, Some(json!({"chainId": 1})));
	assert!(platform.popups_created().is_empty());
}

#[tokio::test]
async fn open_popup_is_reused_across_origins() {
	let (platform, orchestrator) = setup();

	let first = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![json!("hi"), json!("0xabc")], "app.example"));
	wait_for(|| platform.popups_created().len() == 1).await;

	let second = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![json!("yo"), json!("0xdef")], "other.example"));
	wait_for(|| platform.sent_to_popup().len() == 1).await;

	assert_eq!(platform.popups_created().len(), 1);
	assert_eq!(orchestrator.pending_listeners(), 2);
	let sent = platform.sent_to_popup();
	let (window_id, forwarded) = &sent[0];
	assert_eq!(*window_id, created_window(&platform));
	assert_eq!(forwarded.request.origin_host.as_deref(), Some("other.example"));

	let first_ticket = created_ticket(&platform, 0);
	let second_ticket = forwarded.ticket;
	assert!(orchestrator.deliver_popup_response(PopupResponse {
		ticket: Some(second_ticket),
		response: ResponseEnvelope::success(ResponseKind::SignMessage, json!("0xsig2")),
	}));
	assert!(orchestrator.deliver_popup_response(PopupResponse {
		ticket: Some(first_ticket),
		response: ResponseEnvelope::success(ResponseKind::SignMessage, json!("0xsig1")),
	}));

	assert_eq!(first.await.unwrap().payload, Some(json!("0xsig1")));
	assert_eq!(second.await.unwrap().payload, Some(json!("0xsig2")));
	assert_eq!(orchestrator.pending_listeners(), 0);
}

fn created_window(platform: &FakePlatform) -> WindowId {
	platform.popups_created()[0].0
}

#[tokio::test]
async fn closed_popup_is_replaced() {
	let (platform, orchestrator) = setup();

	let _first = spawn_call(&orchestrator, external(ExternalKind::SendTransaction, vec![json!({})], "app.example"));
	wait_for(|| platform.popups_created().len() == 1).await;
	let stale = created_window(&platform);
	platform.close_window(stale);

	let _second = spawn_call(&orchestrator, external(ExternalKind::SendTransaction, vec![json!({})], "app.example"));
	wait_for(|| platform.popups_created().len() == 2).await;

	let created = platform.popups_created();
	assert_ne!(created[1].0, stale);
	assert_eq!(orchestrator.popup().map(|p| p.window_id), Some(created[1].0));
	assert!(platform.sent_to_popup().is_empty());
}

#[tokio::test]
async fn unticketed_response_routes_by_kind() {
	let (platform, orchestrator) = setup();
	let pending = spawn_call(&orchestrator, external(ExternalKind::SwitchChain, vec![json!({"chainId": "0x89"})], "app.example"));
	wait_for(|| platform.popups_created().len() == 1 && orchestrator.popup_gate.try_lock().is_ok()).await;

	assert!(!orchestrator.deliver_popup_response(PopupResponse {
		ticket: None,
		response: ResponseEnvelope::success(ResponseKind::SignMessage, json!("0xsig")),
	}));
	assert!(orchestrator.deliver_popup_response(PopupResponse {
		ticket: None,
		response: ResponseEnvelope::success(ResponseKind::SwitchChain, json!({"address": "0xabc", "chainId": 137})),
	}));

	assert_eq!(pending.await.unwrap().payload.unwrap()["chainId"], 137);
	let record = orchestrator.store().get("app.example").await.unwrap().unwrap();
	assert_eq!(record.chain_id, Some(137));
}

#[tokio::test]
async fn unticketed_response_skips_caller_of_closed_popup() {
	let (platform, orchestrator) = setup();
	let abandoned = spawn_call(&orchestrator, external(ExternalKind::SelectAccount, vec![], "other.example"));
	wait_for(|| orchestrator.popup().is_some() && orchestrator.popup_gate.try_lock().is_ok()).await;
	let stale = created_window(&platform);
	platform.close_window(stale);
	orchestrator.on_window_removed(stale);

	let live = spawn_call(&orchestrator, external(ExternalKind::SelectAccount, vec![], "app.example"));
	wait_for(|| platform.popups_created().len() == 2 && orchestrator.popup_gate.try_lock().is_ok()).await;

	assert!(orchestrator.deliver_popup_response(PopupResponse {
		ticket: None,
		response: ResponseEnvelope::success(ResponseKind::SelectAccount, json!({"address": "0xb", "chainId": 1})),
	}));
	assert_eq!(live.await.unwrap().address(), Some("0xb"));

	let record = orchestrator.store().get("app.example").await.unwrap().unwrap();
	assert_eq!(record.accounts, vec!["0xb".to_string()]);
	assert!(orchestrator.store().get("other.example").await.unwrap().is_none());
	assert!(!abandoned.is_finished());
	assert_eq!(orchestrator.pending_listeners(), 1);
}

#[tokio::test(start_paused = true)]
async fn popup_is_reused_only_after_the_grace_wait() {
	let config = BridgeConfig::default();
	let grace = config.popup.reuse_grace();
	let (platform, orchestrator) = setup_with(config);

	let _first = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![json!("hi"), json!("0xabc")], "app.example"));
	wait_for(|| orchestrator.popup().is_some() && orchestrator.popup_gate.try_lock().is_ok()).await;

	let started = tokio::time::Instant::now();
	let _second = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![json!("yo"), json!("0xdef")], "other.example"));
	tokio::time::sleep(grace / 2).await;
	assert!(platform.sent_to_popup().is_empty());

	wait_for(|| platform.sent_to_popup().len() == 1).await;
	assert!(started.elapsed() >= grace);
	assert_eq!(platform.sent_to_popup()[0].0, created_window(&platform));
	assert_eq!(platform.popups_created().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn popup_closed_during_the_grace_wait_is_replaced_once() {
	let config = BridgeConfig::default();
	let grace = config.popup.reuse_grace();
	let (platform, orchestrator) = setup_with(config);

	let _first = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![json!("hi"), json!("0xabc")], "app.example"));
	wait_for(|| orchestrator.popup().is_some() && orchestrator.popup_gate.try_lock().is_ok()).await;
	let stale = created_window(&platform);

	let second = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![json!("yo"), json!("0xdef")], "other.example"));
	tokio::time::sleep(grace / 2).await;
	assert_eq!(orchestrator.popup().map(|p| p.window_id), Some(stale));
	platform.close_window(stale);

	wait_for(|| platform.popups_created().len() == 2 && orchestrator.popup_gate.try_lock().is_ok()).await;
	tokio::time::sleep(grace * 2).await;

	let created = platform.popups_created();
	assert_eq!(created.len(), 2);
	assert_ne!(created[1].0, stale);
	assert_eq!(orchestrator.popup().map(|p| p.window_id), Some(created[1].0));
	assert!(platform.sent_to_popup().is_empty());

	assert!(orchestrator.deliver_popup_response(PopupResponse {
		ticket: Some(created_ticket(&platform, 1)),
		response: ResponseEnvelope::success(ResponseKind::SignMessage, json!("0xsig2")),
	}));
	assert_eq!(second.await.unwrap().payload, Some(json!("0xsig2")));
}

#[tokio::test]
async fn solana_grants_are_kept_apart_from_evm_grants() {
	let (platform, orchestrator) = setup();
	seed(&orchestrator, "app.example", "0xabc", 1).await;
	let popup = Arc::new(ScriptedPopup::new().approve(ResponseKind::SelectAccount, json!({"address": "So1ana", "chainId": 1})));
	let _driver = popup.attach(&platform, orchestrator.clone());
	let solana = |kind| external(kind, vec![json!(SOLANA_FAMILY)], "app.example");

	let response = call(&orchestrator, solana(ExternalKind::Account)).await;
	assert_eq!(response.error.as_deref(), Some("wallet is not connected"));
	assert!(platform.popups_created().is_empty());

	let response = call(&orchestrator, solana(ExternalKind::SelectAccount)).await;
	assert_eq!(response.address(), Some("So1ana"));
	assert_eq!(popup.seen()[0].request.params, vec![json!(SOLANA_FAMILY)]);

	let evm = orchestrator.store().get("app.example").await.unwrap().unwrap();
	assert_eq!(evm.accounts, vec!["0xabc".to_string()]);
	let grant = orchestrator.store().get("solana:app.example").await.unwrap().unwrap();
	assert_eq!(grant.accounts, vec!["So1ana".to_string()]);

	assert_eq!(call(&orchestrator, solana(ExternalKind::Account)).await.address(), Some("So1ana"));
	assert_eq!(call(&orchestrator, external(ExternalKind::Account, vec![], "app.example")).await.address(), Some("0xabc"));
	assert_eq!(platform.popups_created().len(), 1);

	assert!(orchestrator.disconnect_origin("app.example").await.unwrap());
	assert!(orchestrator.store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn solana_grant_alone_lights_the_icon() {
	let (platform, orchestrator) = setup();
	seed(&orchestrator, "solana:app.example", "So1ana", 1).await;

	orchestrator.refresh_icons().await.unwrap();
	assert_eq!(platform.icon(10), Some(IconState::Connected));
	assert_eq!(platform.icon(12), Some(IconState::Default));

	let cleared = orchestrator.disconnect_all().await.unwrap();
	assert_eq!(cleared, vec!["solana:app.example".to_string()]);
	assert_eq!(platform.notices(), vec![(10, WalletNotice::Disconnect), (11, WalletNotice::Disconnect)]);
}

#[tokio::test]
async fn malformed_popup_response_becomes_unexpected() {
	let (platform, orchestrator) = setup();
	let pending = spawn_call(&orchestrator, external(ExternalKind::SignTypedMessage, vec![], "app.example"));
	wait_for(|| platform.popups_created().len() == 1).await;

	orchestrator.deliver_popup_response(PopupResponse {
		ticket: Some(created_ticket(&platform, 0)),
		response: ResponseEnvelope {
			kind: ResponseKind::SignTypedMessage,
			payload: Some(json!("0xsig")),
			error: Some("both".into()),
		},
	});

	assert_eq!(pending.await.unwrap().error.as_deref(), Some("unexpected response format"));
}

#[tokio::test]
async fn popup_close_leaves_listener_pending_by_default() {
	let (platform, orchestrator) = setup();
	let _pending = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![], "app.example"));
	wait_for(|| platform.popups_created().len() == 1).await;

	orchestrator.on_window_removed(created_window(&platform));

	assert!(orchestrator.popup().is_none());
	assert_eq!(orchestrator.pending_listeners(), 1);
}

#[tokio::test]
async fn popup_close_rejects_when_configured() {
	let mut config = config();
	config.reject_on_popup_close = true;
	let (platform, orchestrator) = setup_with(config);
	let pending = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![], "app.example"));
	wait_for(|| orchestrator.popup().is_some() && orchestrator.popup_gate.try_lock().is_ok()).await;

	orchestrator.on_window_removed(created_window(&platform));

	let response = pending.await.unwrap();
	assert_eq!(response.kind, ResponseKind::SignMessage);
	assert_eq!(response.error.as_deref(), Some("wallet is disconnected"));
}

#[tokio::test]
async fn close_window_without_popup_opens_nothing() {
	let (platform, orchestrator) = setup();
	let response = call(&orchestrator, external(ExternalKind::CloseWindow, vec![], "app.example")).await;
	assert_eq!(response.kind, ResponseKind::CloseWindow);
	assert_eq!(response.payload, Some(json!({"closed": false})));
	assert!(platform.popups_created().is_empty());
}

#[tokio::test]
async fn close_window_is_forwarded_to_live_popup() {
	let (platform, orchestrator) = setup();
	let _pending = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![], "app.example"));
	wait_for(|| orchestrator.popup().is_some()).await;

	let response = call(&orchestrator, external(ExternalKind::CloseWindow, vec![], "app.example")).await;
	assert_eq!(response.payload, Some(json!({"closed": true})));
	let sent = platform.sent_to_popup();
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].1.request.external_kind(), Some(ExternalKind::CloseWindow));
}

#[tokio::test]
async fn attested_sender_host_wins() {
	let (_platform, orchestrator) = setup();
	seed(&orchestrator, "app.example", "0xabc", 1).await;

	let mut request = external(ExternalKind::Account, vec![], "evil.example");
	request.sender = MessageSender {
		tab_id: Some(10),
		url: Some("https://App.Example/dapp".into()),
	};
	let response = call(&orchestrator, request).await;
	assert_eq!(response.address(), Some("0xabc"));
}

#[tokio::test]
async fn request_without_host_fails_as_envelope() {
	let (_platform, orchestrator) = setup();
	let request = InboundRequest {
		envelope: RequestEnvelope::new(ExternalKind::Account, vec![]),
		sender: MessageSender::default(),
	};
	let response = call(&orchestrator, request).await;
	assert!(response.is_error());
	assert_eq!(response.kind, ResponseKind::Account);
}

#[tokio::test]
async fn badge_count_sets_and_clears_text() {
	let (platform, orchestrator) = setup();

	let reply: InternalReply = serde_json::from_value(orchestrator.handle(internal(InternalKind::SetBadgeCount, vec![json!(3)])).await).unwrap();
	assert_eq!(reply.payload, Some(json!({"text": "3"})));
	assert_eq!(platform.badge(), "3");

	orchestrator.handle(internal(InternalKind::SetBadgeCount, vec![json!(0)])).await;
	assert_eq!(platform.badge(), "");
}

#[tokio::test]
async fn preferences_are_served() {
	let (_platform, orchestrator) = setup();
	orchestrator
		.store()
		.set_preferences(&wb_protocol::Preferences {
			compatibility_mode: true,
			messaging_enabled: true,
		})
		.await
		.unwrap();

	let reply: InternalReply = serde_json::from_value(orchestrator.handle(internal(InternalKind::GetPreferences, vec![])).await).unwrap();
	assert_eq!(reply.payload, Some(json!({"compatibilityMode": true, "messagingEnabled": true})));

	let reply: InternalReply = serde_json::from_value(orchestrator.handle(internal(InternalKind::MessagingReady, vec![])).await).unwrap();
	assert_eq!(reply.payload, Some(json!({"ready": true, "enabled": true})));
	assert!(orchestrator.state.lock().messaging_ready());
}

#[tokio::test]
async fn focused_window_ignores_popup() {
	let (platform, orchestrator) = setup();
	orchestrator.on_window_focus_changed(Some(7));
	orchestrator.on_window_focus_changed(None);
	assert_eq!(orchestrator.focused_window(), Some(7));

	let _pending = spawn_call(&orchestrator, external(ExternalKind::SignMessage, vec![], "app.example"));
	wait_for(|| orchestrator.popup().is_some()).await;
	orchestrator.on_window_focus_changed(Some(created_window(&platform)));
	assert_eq!(orchestrator.focused_window(), Some(7));

	let reply: InternalReply = serde_json::from_value(orchestrator.handle(internal(InternalKind::FocusedWindow, vec![])).await).unwrap();
	assert_eq!(reply.payload, Some(json!({"windowId": 7})));
}

#[tokio::test]
async fn tab_events_update_icons() {
	let (platform, orchestrator) = setup();
	seed(&orchestrator, "app.example", "0xabc", 1).await;

	orchestrator.on_tab_activated(10).await.unwrap();
	assert_eq!(platform.icon(10), Some(IconState::Connected));

	let tab = platform.add_tab(13, PARENT_WINDOW, "https://other.example/page");
	orchestrator.on_tab_created(&tab).await.unwrap();
	assert_eq!(platform.icon(13), Some(IconState::Default));

	let tab = platform.add_tab(13, PARENT_WINDOW, "https://app.example/moved");
	orchestrator.on_tab_updated(&tab).await.unwrap();
	assert_eq!(platform.icon(13), Some(IconState::Connected));

	assert_eq!(orchestrator.refresh_icons().await.unwrap(), 4);
	assert_eq!(platform.icon(12), Some(IconState::Default));
}

#[tokio::test]
async fn disconnect_origin_revokes_tabs() {
	let (platform, orchestrator) = setup();
	seed(&orchestrator, "app.example", "0xabc", 1).await;

	assert!(orchestrator.disconnect_origin("App.Example").await.unwrap());
	assert!(!orchestrator.disconnect_origin("app.example").await.unwrap());

	assert_eq!(platform.icon(10), Some(IconState::Default));
	let notices = platform.notices();
	assert_eq!(notices, vec![(10, WalletNotice::Disconnect), (11, WalletNotice::Disconnect)]);

	let response = call(&orchestrator, external(ExternalKind::Account, vec![], "app.example")).await;
	assert!(response.is_error());
}

#[tokio::test]
async fn disconnect_all_clears_every_origin() {
	let (platform, orchestrator) = setup();
	seed(&orchestrator, "app.example", "0xabc", 1).await;
	seed(&orchestrator, "other.example", "0xdef", 1).await;

	let cleared = orchestrator.disconnect_all().await.unwrap();
	assert_eq!(cleared, vec!["app.example".to_string(), "other.example".to_string()]);
	assert_eq!(platform.notices().len(), 3);
	assert!(orchestrator.store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn background_handle_serves_requests() {
	let (_platform, orchestrator) = setup();
	let channel = orchestrator.clone().spawn();
	let handle = channel.handle(MessageSender::default());

	let mut envelope = RequestEnvelope::new(ExternalKind::ChainId, vec![]);
	envelope.stamp_origin("app.example");
	let value = wb_runtime::PrivilegedChannel::call(&handle, envelope).await.unwrap();
	assert_eq!(value, json!({"kind": "chainIdResponse", "payload": {"chainId": 1}}));
}

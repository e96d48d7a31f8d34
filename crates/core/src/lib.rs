//! Wallet request bridge between untrusted pages and a privileged background.
//!
//! A request travels page → relay → background and its answer travels back
//! the same way:
//!
//! - [`page::PageProvider`] serializes requests, caches the last account and
//!   emits wallet events. [`page::SolanaWallet`] exposes the same primitive
//!   under wallet-standard features.
//! - [`relay::IsolatedRelay`] stamps the page host and forwards envelopes
//!   over a [`wb_runtime::PrivilegedChannel`].
//! - [`background::Orchestrator`] answers internal kinds, applies the
//!   short-circuit rules and drives the single popup window.
//! - [`store::ConnectionStore`] persists per-origin authorization.
//! - [`popup`] holds the contract the popup screens must keep.
//!
//! # Example
//!
//! ```ignore
//! let platform = Arc::new(FakePlatform::new());
//! let orchestrator = Arc::new(Orchestrator::new(platform, ConnectionStore::in_memory(), BridgeConfig::default()));
//! let channel = orchestrator.clone().spawn();
//!
//! let (page_end, relay_end) = wb_runtime::memory_pair();
//! let relay = Arc::new(IsolatedRelay::new("app.example", Arc::new(channel.handle(MessageSender::default()))));
//! let _relay = relay.serve(relay_end);
//!
//! let provider = PageProvider::connect(page_end, BridgeConfig::default().provider);
//! let chain = provider.request_method("eth_chainId", vec![]).await?;
//! ```

pub mod background;
pub mod config;
pub mod error;
pub mod page;
pub mod popup;
pub mod relay;
pub mod store;
pub mod testing;

pub use background::{BackgroundChannel, BackgroundHandle, InboundRequest, MessageSender, Orchestrator, Platform};
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use page::{PageProvider, ProviderError, ProviderEvent, SolanaWallet};
pub use relay::{IsolatedRelay, RelayHandle};
pub use store::{ConnectionStore, FileStorage, MemoryStorage, StorageArea};
pub use wb_protocol as protocol;

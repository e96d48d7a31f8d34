//! Privileged channel between the relay and the background.

use async_trait::async_trait;
use serde_json::Value;
use wb_protocol::RequestEnvelope;

use crate::error::Result;

/// One request in, one settled answer out.
///
/// The answer is the raw JSON the background produced: a serialized
/// `ResponseEnvelope` for external kinds, an `InternalReply` for internal
/// ones. Callers validate the shape themselves since it crossed a trust
/// boundary.
#[async_trait]
pub trait PrivilegedChannel: Send + Sync {
	async fn call(&self, envelope: RequestEnvelope) -> Result<Value>;
}

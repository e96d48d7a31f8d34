//! Messages exchanged on the page's local event bus.

use serde::{Deserialize, Serialize};

use crate::discovery::WalletNotice;
use crate::envelope::{RequestEnvelope, ResponseEnvelope};

/// Tagged union carried between page and relay.
///
/// ```json
/// { "type": "request", "id": 3, "envelope": { "kind": "accountRequest", "params": [] } }
/// { "type": "response", "id": 3, "response": { "kind": "accountResponse", "payload": {...} } }
/// { "type": "notice", "notice": { "event": "disconnect" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
	Request { id: u64, envelope: RequestEnvelope },
	Response { id: u64, response: ResponseEnvelope },
	Notice { notice: WalletNotice },
}

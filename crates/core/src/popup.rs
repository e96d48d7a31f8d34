//! Popup side of the connect flow.
//!
//! The interactive screens are out of scope; what lives here is the contract
//! they must keep. Every external request handed to the popup, at launch or
//! while it is open, produces exactly one [`PopupResponse`] of the derived
//! response kind:
//!
//! ```text
//! AwaitingResolution --approve--> Responded(Success)
//!                    --reject---> Responded(Error)
//! ```

use async_trait::async_trait;
use serde_json::Value;
use wb_protocol::{ExternalKind, PopupRequest, PopupResponse, ResponseEnvelope, ResponseKind, WalletError};

use crate::background::popup_window::parse_launch_url;
use crate::error::{Error, Result};

/// How a request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Success,
	Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
	AwaitingResolution,
	Responded(Outcome),
}

/// One request's lifecycle inside the popup.
#[derive(Debug, Clone)]
pub struct PopupFlow {
	request: PopupRequest,
	kind: ExternalKind,
	state: FlowState,
}

impl PopupFlow {
	/// Starts a flow for `request`. Internal kinds never reach the popup.
	pub fn new(request: PopupRequest) -> Result<Self> {
		let kind = request.request.external_kind().ok_or(Error::Wallet(WalletError::UnsupportedRequestKind))?;
		Ok(Self {
			request,
			kind,
			state: FlowState::AwaitingResolution,
		})
	}

	/// Starts a flow from the URL the popup window was opened with.
	pub fn from_launch_url(url: &str) -> Result<Self> {
		Self::new(parse_launch_url(url)?)
	}

	pub fn request(&self) -> &PopupRequest {
		&self.request
	}

	pub fn kind(&self) -> ExternalKind {
		self.kind
	}

	pub fn response_kind(&self) -> ResponseKind {
		self.kind.response_kind()
	}

	pub fn state(&self) -> FlowState {
		self.state
	}

	pub fn approve(&mut self, payload: Value) -> Result<PopupResponse> {
		self.respond(ResponseEnvelope::success(self.response_kind(), payload), Outcome::Success)
	}

	pub fn reject(&mut self, error: WalletError) -> Result<PopupResponse> {
		self.respond(ResponseEnvelope::failure(self.response_kind(), error.message()), Outcome::Error)
	}

	fn respond(&mut self, response: ResponseEnvelope, outcome: Outcome) -> Result<PopupResponse> {
		if let FlowState::Responded(_) = self.state {
			return Err(Error::Popup(format!("ticket {} already answered", self.request.ticket)));
		}
		self.state = FlowState::Responded(outcome);
		Ok(PopupResponse {
			ticket: Some(self.request.ticket),
			response,
		})
	}
}

/// The user's decision on one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
	Approve(Value),
	Reject(WalletError),
}

/// Decides requests on behalf of the popup screens.
#[async_trait]
pub trait PopupController: Send + Sync {
	/// `None` leaves the request unanswered, like a user who walks away.
	async fn decide(&self, request: &PopupRequest) -> Option<Decision>;
}

/// Runs one request through `controller` and returns the single response, if any.
pub async fn resolve(controller: &dyn PopupController, request: PopupRequest) -> Result<Option<PopupResponse>> {
	let mut flow = PopupFlow::new(request)?;
	let response = match controller.decide(flow.request()).await {
		Some(Decision::Approve(payload)) => flow.approve(payload)?,
		Some(Decision::Reject(error)) => flow.reject(error)?,
		None => return Ok(None),
	};
	Ok(Some(response))
}

//! Popup launch URL and placement.

use url::Url;
use wb_protocol::PopupRequest;

use super::platform::{PopupSpec, WindowBounds};
use crate::config::PopupConfig;
use crate::error::{Error, Result};

/// Query parameter carrying the serialized [`PopupRequest`].
pub const REQUEST_PARAM: &str = "request";

/// Popup page URL with `request` embedded as JSON in the query string.
pub fn launch_url(base: &str, request: &PopupRequest) -> Result<String> {
	let mut url = Url::parse(base)?;
	url.query_pairs_mut().append_pair(REQUEST_PARAM, &serde_json::to_string(request)?);
	Ok(url.into())
}

/// Recovers the [`PopupRequest`] embedded by [`launch_url`].
pub fn parse_launch_url(url: &str) -> Result<PopupRequest> {
	let url = Url::parse(url)?;
	let (_, value) = url
		.query_pairs()
		.find(|(key, _)| key == REQUEST_PARAM)
		.ok_or_else(|| Error::Popup(format!("launch url has no {REQUEST_PARAM} parameter")))?;
	Ok(serde_json::from_str(&value)?)
}

/// Places the popup at the top-right corner of `parent`.
pub fn placement(config: &PopupConfig, parent: WindowBounds) -> WindowBounds {
	let right = parent.left + parent.width as i32;
	WindowBounds {
		left: right - config.width as i32 - config.right_margin,
		top: parent.top + config.top_offset,
		width: config.width,
		height: config.height,
	}
}

/// Window spec for a new popup; unplaced when the parent is unknown.
pub fn popup_spec(config: &PopupConfig, url: String, parent: Option<WindowBounds>) -> PopupSpec {
	PopupSpec {
		url,
		bounds: parent.map(|parent| placement(config, parent)),
		width: config.width,
		height: config.height,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use wb_protocol::{ExternalKind, RequestEnvelope, TabDescriptor};

	use super::*;

	#[test]
	fn launch_url_round_trips_request() {
		let request = PopupRequest {
			ticket: 4,
			request: RequestEnvelope::new(ExternalKind::SignMessage, vec![json!("hello & bye"), json!("0xabc")]),
			source: TabDescriptor {
				title: "App".into(),
				url: "https://app.example/".into(),
				fav_icon_url: None,
			},
		};
		let url = launch_url("chrome-extension://abc/index.html", &request).unwrap();
		assert!(url.starts_with("chrome-extension://abc/index.html?request="));
		assert_eq!(parse_launch_url(&url).unwrap(), request);
	}

	#[test]
	fn launch_url_without_request_is_rejected() {
		assert!(matches!(parse_launch_url("chrome-extension://abc/index.html"), Err(Error::Popup(_))));
	}

	#[test]
	fn placement_is_top_right_of_parent() {
		let config = PopupConfig::default();
		let bounds = placement(
			&config,
			WindowBounds {
				left: 100,
				top: 50,
				width: 1200,
				height: 800,
			},
		);
		assert_eq!(bounds.left, 100 + 1200 - 400 - 20);
		assert_eq!(bounds.top, 130);
		assert_eq!((bounds.width, bounds.height), (400, 628));
	}

	#[test]
	fn spec_without_parent_is_unplaced() {
		let spec = popup_spec(&PopupConfig::default(), "chrome-extension://abc/".into(), None);
		assert!(spec.bounds.is_none());
		assert_eq!(spec.width, 400);
	}
}

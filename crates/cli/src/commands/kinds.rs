use serde_json::{Value, json};
use wb::protocol::RequestKind;

pub fn execute() -> Value {
	let kinds: Vec<Value> = RequestKind::all()
		.map(|kind| {
			json!({
				"request": kind.as_str(),
				"response": kind.response_kind().map(|response| response.as_str()),
				"scope": if kind.is_external() { "external" } else { "internal" },
			})
		})
		.collect();
	json!(kinds)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lists_both_scopes() {
		let kinds = execute();
		let kinds = kinds.as_array().unwrap();
		let account = kinds.iter().find(|k| k["request"] == "accountRequest").unwrap();
		assert_eq!(account["response"], "accountResponse");
		assert_eq!(account["scope"], "external");

		let badge = kinds.iter().find(|k| k["request"] == "setBadgeCountRequest").unwrap();
		assert!(badge["response"].is_null());
		assert_eq!(badge["scope"], "internal");
	}
}

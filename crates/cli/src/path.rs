//! Command-line addressing of remote members.
//!
//! `abc.settings.volume` names the property `volume` on the value at item
//! path `["abc", "settings"]`.

use serde_json::Value;

use crate::error::{CliError, Result};

/// Item path plus the member to read or call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPath {
	pub item_path: Vec<String>,
	pub name: String,
}

impl MemberPath {
	pub fn parse(path: &str) -> Result<Self> {
		let invalid = |reason| CliError::InvalidPath {
			path: path.to_string(),
			reason,
		};

		let mut segments: Vec<String> = path.split('.').map(str::to_string).collect();
		if segments.iter().any(String::is_empty) {
			return Err(invalid("empty segment"));
		}
		let name = match segments.pop() {
			Some(name) if !segments.is_empty() => name,
			_ => return Err(invalid("expected <identity>.<name>")),
		};

		Ok(Self {
			item_path: segments,
			name,
		})
	}
}

impl std::fmt::Display for MemberPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.item_path.join("."), self.name)
	}
}

/// Parses a call argument as JSON, falling back to a plain string.
pub fn parse_arg(arg: &str) -> Value {
	serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn identity_and_member() {
		let path = MemberPath::parse("abc.greet").unwrap();
		assert_eq!(path.item_path, ["abc"]);
		assert_eq!(path.name, "greet");
	}

	#[test]
	fn nested_members() {
		let path = MemberPath::parse("abc.settings.audio.volume").unwrap();
		assert_eq!(path.item_path, ["abc", "settings", "audio"]);
		assert_eq!(path.name, "volume");
		assert_eq!(path.to_string(), "abc.settings.audio.volume");
	}

	#[test]
	fn rejects_malformed_paths() {
		for input in ["", "abc", "abc.", ".greet", "abc..greet"] {
			assert!(
				matches!(MemberPath::parse(input), Err(CliError::InvalidPath { .. })),
				"accepted {input:?}"
			);
		}
	}

	#[test]
	fn args_are_json_when_possible() {
		assert_eq!(parse_arg("1"), json!(1));
		assert_eq!(parse_arg("-2.5"), json!(-2.5));
		assert_eq!(parse_arg("true"), json!(true));
		assert_eq!(parse_arg("null"), json!(null));
		assert_eq!(parse_arg(r#"{"a":[1]}"#), json!({"a": [1]}));
		assert_eq!(parse_arg(r#""quoted""#), json!("quoted"));
		assert_eq!(parse_arg("Ann"), json!("Ann"));
		assert_eq!(parse_arg("{broken"), json!("{broken"));
	}
}

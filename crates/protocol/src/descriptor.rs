//! Interface descriptors returned by `exposed_interface`.
//!
//! A descriptor tells clients what shape to expect from exposed items before
//! they start probing paths. The bridge never checks calls against it; it is
//! returned verbatim.
//!
//! ```text
//! {
//!   "calculator": {
//!     "type": "object",
//!     "members": {
//!       "add": { "type": "function", "params": [{"type": "number"}, {"type": "number"}], "returns": {"type": "number"} }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shape of a single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TypeDescriptor {
	Any,
	Null,
	Boolean,
	Number,
	String,
	Array {
		items: Box<TypeDescriptor>,
	},
	Object {
		#[serde(default)]
		members: BTreeMap<String, TypeDescriptor>,
	},
	Function {
		#[serde(default)]
		params: Vec<TypeDescriptor>,
		returns: Box<TypeDescriptor>,
	},
	/// Settles later to a value of the inner type.
	Deferred {
		value: Box<TypeDescriptor>,
	},
}

impl TypeDescriptor {
	pub fn array(items: TypeDescriptor) -> Self {
		TypeDescriptor::Array {
			items: Box::new(items),
		}
	}

	pub fn object<K, I>(members: I) -> Self
	where
		K: Into<String>,
		I: IntoIterator<Item = (K, TypeDescriptor)>,
	{
		TypeDescriptor::Object {
			members: members.into_iter().map(|(k, v)| (k.into(), v)).collect(),
		}
	}

	pub fn function(params: impl IntoIterator<Item = TypeDescriptor>, returns: TypeDescriptor) -> Self {
		TypeDescriptor::Function {
			params: params.into_iter().collect(),
			returns: Box::new(returns),
		}
	}

	pub fn deferred(value: TypeDescriptor) -> Self {
		TypeDescriptor::Deferred {
			value: Box::new(value),
		}
	}
}

/// Named top-level items offered by a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceDescriptor {
	items: BTreeMap<String, TypeDescriptor>,
}

impl InterfaceDescriptor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces an item description.
	pub fn item(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
		self.items.insert(name.into(), ty);
		self
	}

	pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
		self.items.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
		self.items.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// JSON form sent to clients.
	pub fn to_value(&self) -> serde_json::Value {
		serde_json::Value::Object(
			self.items
				.iter()
				.map(|(name, ty)| (name.clone(), type_to_value(ty)))
				.collect(),
		)
	}
}

fn type_to_value(ty: &TypeDescriptor) -> serde_json::Value {
	use serde_json::{Value, json};

	match ty {
		TypeDescriptor::Any => json!({"type": "any"}),
		TypeDescriptor::Null => json!({"type": "null"}),
		TypeDescriptor::Boolean => json!({"type": "boolean"}),
		TypeDescriptor::Number => json!({"type": "number"}),
		TypeDescriptor::String => json!({"type": "string"}),
		TypeDescriptor::Array { items } => json!({"type": "array", "items": type_to_value(items)}),
		TypeDescriptor::Object { members } => {
			let members: serde_json::Map<String, Value> = members
				.iter()
				.map(|(name, ty)| (name.clone(), type_to_value(ty)))
				.collect();
			json!({"type": "object", "members": members})
		}
		TypeDescriptor::Function { params, returns } => json!({
			"type": "function",
			"params": params.iter().map(type_to_value).collect::<Vec<_>>(),
			"returns": type_to_value(returns),
		}),
		TypeDescriptor::Deferred { value } => json!({"type": "deferred", "value": type_to_value(value)}),
	}
}

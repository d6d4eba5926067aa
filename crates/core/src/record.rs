//! Ready-made dynamic object.

use std::future::Future;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use tether_protocol::Fault;

use crate::value::{Exposed, Method, Value};

/// Object with a fixed set of named members, built up front.
///
/// ```ignore
/// let greeter = Record::new()
///     .with("name", json!("greeter"))
///     .method("greet", |_, args| {
///         let (who,): (String,) = parse_args(args)?;
///         Ok(json!(format!("hi {who}")))
///     });
/// ```
#[derive(Clone, Default)]
pub struct Record {
	members: IndexMap<String, Value>,
}

impl Record {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a data member or nested object.
	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.members.insert(name.into(), value.into());
		self
	}

	/// Adds a nested record.
	pub fn nested(self, name: impl Into<String>, record: Record) -> Self {
		self.with(name, Value::object(record))
	}

	/// Adds a method that settles immediately.
	pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
	where
		F: Fn(&Value, Vec<Json>) -> Result<Json, Fault> + Send + Sync + 'static,
	{
		self.with(name, Method::sync(f))
	}

	/// Adds a method that settles later.
	pub fn deferred_method<F, Fut>(self, name: impl Into<String>, f: F) -> Self
	where
		F: Fn(&Value, Vec<Json>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Json, Fault>> + Send + 'static,
	{
		self.with(name, Method::deferred(f))
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.members.keys().map(String::as_str)
	}
}

impl Exposed for Record {
	fn get(&self, name: &str) -> Result<Option<Value>, Fault> {
		Ok(self.members.get(name).cloned())
	}

	/// Data and nested objects in declaration order; methods are left out.
	fn snapshot(&self) -> Json {
		let map: Map<String, Json> = self
			.members
			.iter()
			.filter_map(|(name, value)| value.to_json().map(|json| (name.clone(), json)))
			.collect();
		Json::Object(map)
	}
}

impl From<Record> for Value {
	fn from(record: Record) -> Self {
		Value::object(record)
	}
}

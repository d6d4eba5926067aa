//! RemoteItem - proxy for a value reachable on the host.
//!
//! A [`RemoteItem`] is an item path plus a connection. Property reads and
//! method calls are sent against that path; [`RemoteItem::member`] extends
//! the path without any round trip.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::connection::Connection;
use crate::error::Result;

/// Handle to an exposed item, or to a value nested inside one.
#[derive(Clone)]
pub struct RemoteItem {
	path: Arc<[String]>,
	connection: Arc<Connection>,
}

impl RemoteItem {
	/// Creates a proxy for the item registered under `identity`.
	pub fn new(identity: impl Into<String>, connection: Arc<Connection>) -> Self {
		Self {
			path: Arc::from(vec![identity.into()]),
			connection,
		}
	}

	/// Returns the identity of the root item.
	pub fn identity(&self) -> &str {
		&self.path[0]
	}

	/// Returns the full item path, identity first.
	pub fn path(&self) -> &[String] {
		&self.path
	}

	/// Proxy for a member of this value. No request is sent.
	pub fn member(&self, name: impl Into<String>) -> RemoteItem {
		let mut path = self.path.to_vec();
		path.push(name.into());
		Self {
			path: path.into(),
			connection: Arc::clone(&self.connection),
		}
	}

	/// Reads a property and deserializes it. `Ok(None)` when unreachable.
	pub async fn get<R: DeserializeOwned>(&self, prop: &str) -> Result<Option<R>> {
		match self.connection.fetch(self.path.to_vec(), prop).await? {
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
			None => Ok(None),
		}
	}

	/// Invokes a method and returns the raw JSON result.
	pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
		self.connection.call(self.path.to_vec(), method, args).await
	}

	/// Invokes a method and deserializes its result.
	pub async fn call<R: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> Result<R> {
		let value = self.invoke(method, args).await?;
		serde_json::from_value(value).map_err(Into::into)
	}

	/// Invokes a method that returns nothing useful.
	pub async fn call_no_result(&self, method: &str, args: Vec<Value>) -> Result<()> {
		let _: Value = self.invoke(method, args).await?;
		Ok(())
	}
}

impl std::fmt::Debug for RemoteItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteItem").field("path", &self.path).finish()
	}
}

//! Identity to value store for exposed items.
//!
//! Entries are never removed. Insertion order is kept so that listings come
//! back in exposure order. Reads hold the lock only long enough to clone.

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::value::{Exposed, Value};

/// Times [`Registry::expose`] asks its identity source before falling back to a UUID.
pub const MAX_IDENTITY_ATTEMPTS: usize = 16;

/// Opaque token naming an exposed item.
pub type Identity = Arc<str>;

/// Generator for fresh identities.
pub trait IdentitySource: Send + Sync + 'static {
	fn next_identity(&self) -> String;
}

/// Random UUID v4 identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdentities;

impl IdentitySource for UuidIdentities {
	fn next_identity(&self) -> String {
		Uuid::new_v4().to_string()
	}
}

impl<F> IdentitySource for F
where
	F: Fn() -> String + Send + Sync + 'static,
{
	fn next_identity(&self) -> String {
		self()
	}
}

/// Registry of exposed items.
pub struct Registry {
	items: RwLock<IndexMap<Identity, Value>>,
	identities: Box<dyn IdentitySource>,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	pub fn new() -> Self {
		Self::with_identities(UuidIdentities)
	}

	pub fn with_identities(source: impl IdentitySource) -> Self {
		Self {
			items: RwLock::new(IndexMap::new()),
			identities: Box::new(source),
		}
	}

	/// Stores `value` under a fresh identity and returns it.
	///
	/// A source handing out an identity already in use is asked again, up to
	/// [`MAX_IDENTITY_ATTEMPTS`] times; after that a random UUID is used.
	/// Candidates are drawn without holding the lock.
	pub fn expose(&self, value: impl Into<Value>) -> Identity {
		let value = value.into();
		let mut attempt = 0;
		loop {
			attempt += 1;
			let candidate: Identity = if attempt <= MAX_IDENTITY_ATTEMPTS {
				Arc::from(self.identities.next_identity())
			} else {
				Arc::from(UuidIdentities.next_identity())
			};

			let mut items = self.items.write();
			match items.entry(candidate) {
				Entry::Occupied(entry) => {
					tracing::warn!(identity = %entry.key(), attempt, "Identity already in use; retrying");
				}
				Entry::Vacant(entry) => {
					let identity = Arc::clone(entry.key());
					entry.insert(value);
					tracing::debug!(%identity, "Exposed item");
					return identity;
				}
			}
		}
	}

	pub fn lookup(&self, identity: &str) -> Option<Value> {
		self.items.read().get(identity).cloned()
	}

	/// Looks up a host object and downcasts it to its concrete type.
	pub fn get_as<T: Exposed>(&self, identity: &str) -> Option<Arc<T>> {
		match self.lookup(identity)? {
			Value::Object(object) => object.into_any_arc().downcast::<T>().ok(),
			_ => None,
		}
	}

	/// Every identity, in exposure order.
	pub fn identities(&self) -> Vec<Identity> {
		self.items.read().keys().cloned().collect()
	}

	pub fn contains(&self, identity: &str) -> bool {
		self.items.read().contains_key(identity)
	}

	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.read().is_empty()
	}
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry").field("len", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use serde_json::json;

	use super::*;
	use crate::Record;

	#[test]
	fn identities_are_distinct_and_ordered() {
		let registry = Registry::new();
		let ids: Vec<_> = (0..50).map(|i| registry.expose(json!(i))).collect();

		let unique: HashSet<_> = ids.iter().collect();
		assert_eq!(unique.len(), 50);
		assert_eq!(registry.identities(), ids);
		assert_eq!(registry.len(), 50);
	}

	#[test]
	fn same_value_twice_gets_two_identities() {
		let registry = Registry::new();
		let record = Record::new().with("a", json!(1));
		let first = registry.expose(record.clone());
		let second = registry.expose(record);
		assert_ne!(first, second);
		assert_eq!(registry.identities().len(), 2);
	}

	#[test]
	fn colliding_source_is_retried() {
		let calls = AtomicUsize::new(0);
		let registry = Registry::with_identities(move || {
			// Hands out "a", "a", "b", "c", ...
			let n = calls.fetch_add(1, Ordering::SeqCst);
			let n = if n == 0 { 0 } else { n - 1 };
			((b'a' + n as u8) as char).to_string()
		});

		assert_eq!(&*registry.expose(json!(1)), "a");
		assert_eq!(&*registry.expose(json!(2)), "b");
		assert_eq!(registry.lookup("a").unwrap().to_json(), Some(json!(1)));
		assert_eq!(registry.lookup("b").unwrap().to_json(), Some(json!(2)));
	}

	#[test]
	fn stuck_source_falls_back_to_uuids() {
		let calls = Arc::new(AtomicUsize::new(0));
		let registry = Registry::with_identities({
			let calls = Arc::clone(&calls);
			move || {
				calls.fetch_add(1, Ordering::SeqCst);
				"same".to_string()
			}
		});

		assert_eq!(&*registry.expose(json!(1)), "same");
		let second = registry.expose(json!(2));
		assert!(Uuid::parse_str(&second).is_ok(), "got {second}");
		assert_eq!(calls.load(Ordering::SeqCst), 1 + MAX_IDENTITY_ATTEMPTS);
		assert_eq!(registry.lookup(&second).unwrap().to_json(), Some(json!(2)));
	}

	#[test]
	fn lookup_and_downcast() {
		let registry = Registry::new();
		assert!(registry.is_empty());
		assert!(registry.lookup("nope").is_none());

		let id = registry.expose(Record::new().with("x", json!(1)));
		let data = registry.expose(json!({"x": 1}));
		assert!(registry.contains(&id));

		let record = registry.get_as::<Record>(&id).unwrap();
		assert_eq!(record.len(), 1);
		assert!(registry.get_as::<Record>(&data).is_none());
		assert!(registry.get_as::<Record>("nope").is_none());
	}

	#[test]
	fn uuid_identities_look_like_uuids() {
		let id = UuidIdentities.next_identity();
		assert!(Uuid::parse_str(&id).is_ok());
	}
}

//! Values the bridge can expose, walk, and invoke.
//!
//! The bridge does not know the shape of what it exposes, so everything it
//! touches is a [`Value`]: plain JSON data, a host object implementing
//! [`Exposed`], or a callable [`Method`]. Resolution and dispatch branch on
//! the [`Kind`] of a value rather than inspecting it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tether_protocol::Fault;

/// Coarse classification used by the resolver and dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	/// Scalars and null; members cannot be read off them.
	Primitive,
	/// JSON objects and arrays, and host objects.
	Indexable,
	/// Methods.
	Callable,
}

/// A host object with named members.
///
/// Implement this for types whose members are computed or stateful; use
/// [`Record`](crate::Record) for ad-hoc objects.
pub trait Exposed: DowncastSync {
	/// Reads a member.
	///
	/// `Ok(None)` means the member does not exist; `Err` means reading it failed.
	fn get(&self, name: &str) -> Result<Option<Value>, Fault>;

	/// JSON form sent when this object is itself fetched as a property.
	fn snapshot(&self) -> Json {
		Json::Object(Default::default())
	}
}

impl_downcast!(sync Exposed);

/// Anything reachable from an exposed item.
#[derive(Clone)]
pub enum Value {
	Data(Json),
	Object(Arc<dyn Exposed>),
	Method(Method),
}

impl Value {
	/// Wraps a host object.
	pub fn object(object: impl Exposed) -> Self {
		Value::Object(Arc::new(object))
	}

	pub fn kind(&self) -> Kind {
		match self {
			Value::Data(Json::Object(_) | Json::Array(_)) | Value::Object(_) => Kind::Indexable,
			Value::Data(_) => Kind::Primitive,
			Value::Method(_) => Kind::Callable,
		}
	}

	pub fn is_indexable(&self) -> bool {
		self.kind() == Kind::Indexable
	}

	/// Reads a member off an indexable value.
	///
	/// JSON objects are indexed by key, JSON arrays by decimal index or
	/// `length`. Primitives and methods have no members.
	pub fn member(&self, name: &str) -> Result<Option<Value>, Fault> {
		match self {
			Value::Object(object) => object.get(name),
			Value::Data(Json::Object(map)) => Ok(map.get(name).cloned().map(Value::Data)),
			Value::Data(Json::Array(items)) => {
				if name == "length" {
					return Ok(Some(Value::Data(Json::from(items.len()))));
				}
				Ok(name
					.parse::<usize>()
					.ok()
					.and_then(|index| items.get(index))
					.cloned()
					.map(Value::Data))
			}
			Value::Data(_) | Value::Method(_) => Ok(None),
		}
	}

	/// JSON form of this value; methods have none.
	pub fn to_json(&self) -> Option<Json> {
		match self {
			Value::Data(json) => Some(json.clone()),
			Value::Object(object) => Some(object.snapshot()),
			Value::Method(_) => None,
		}
	}

	/// Borrows the concrete host object behind this value.
	pub fn downcast_ref<T: Exposed>(&self) -> Option<&T> {
		match self {
			Value::Object(object) => object.downcast_ref::<T>(),
			_ => None,
		}
	}

	pub fn as_method(&self) -> Option<&Method> {
		match self {
			Value::Method(method) => Some(method),
			_ => None,
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Data(json) => f.debug_tuple("Data").field(json).finish(),
			Value::Object(object) => f.debug_tuple("Object").field(&object.snapshot()).finish(),
			Value::Method(_) => f.write_str("Method"),
		}
	}
}

impl From<Json> for Value {
	fn from(json: Json) -> Self {
		Value::Data(json)
	}
}

impl From<Method> for Value {
	fn from(method: Method) -> Self {
		Value::Method(method)
	}
}

impl From<Arc<dyn Exposed>> for Value {
	fn from(object: Arc<dyn Exposed>) -> Self {
		Value::Object(object)
	}
}

/// What a method hands back to the dispatcher.
pub enum Invocation {
	/// Settled before the method returned.
	Immediate(Result<Json, Fault>),
	/// Settles later; the dispatcher responds once it does.
	Deferred(BoxFuture<'static, Result<Json, Fault>>),
}

impl Invocation {
	pub fn ok(value: impl Into<Json>) -> Self {
		Invocation::Immediate(Ok(value.into()))
	}

	pub fn err(fault: impl Into<Fault>) -> Self {
		Invocation::Immediate(Err(fault.into()))
	}

	pub fn deferred<F>(future: F) -> Self
	where
		F: Future<Output = Result<Json, Fault>> + Send + 'static,
	{
		Invocation::Deferred(future.boxed())
	}

	pub fn is_deferred(&self) -> bool {
		matches!(self, Invocation::Deferred(_))
	}
}

type MethodFn = dyn Fn(&Value, Vec<Json>) -> Invocation + Send + Sync;

/// Callable member. Receives the value it was read from as its receiver.
#[derive(Clone)]
pub struct Method(Arc<MethodFn>);

impl Method {
	/// Method deciding for itself whether it settles now or later.
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&Value, Vec<Json>) -> Invocation + Send + Sync + 'static,
	{
		Method(Arc::new(f))
	}

	/// Method that always settles immediately.
	pub fn sync<F>(f: F) -> Self
	where
		F: Fn(&Value, Vec<Json>) -> Result<Json, Fault> + Send + Sync + 'static,
	{
		Method::new(move |this, args| Invocation::Immediate(f(this, args)))
	}

	/// Method that always settles later.
	pub fn deferred<F, Fut>(f: F) -> Self
	where
		F: Fn(&Value, Vec<Json>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Json, Fault>> + Send + 'static,
	{
		Method::new(move |this, args| Invocation::Deferred(f(this, args).boxed()))
	}

	/// Calls the method with `receiver` bound as its owner.
	pub fn invoke(&self, receiver: &Value, args: Vec<Json>) -> Invocation {
		(self.0)(receiver, args)
	}
}

impl fmt::Debug for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Method")
	}
}

/// Deserializes positional arguments, typically into a tuple.
///
/// ```ignore
/// let (name, times): (String, u32) = parse_args(args)?;
/// ```
pub fn parse_args<T: DeserializeOwned>(args: Vec<Json>) -> Result<T, Fault> {
	serde_json::from_value(Json::Array(args))
		.map_err(|e| Fault::new(format!("invalid arguments: {e}")))
}

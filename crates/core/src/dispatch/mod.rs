//! Host-side protocol handling.
//!
//! The [`Dispatcher`] turns one inbound message into at most one response.
//! It holds no per-call state: a call is identified only by the correlation
//! token it arrived with, so deferred responses may go out in any order.
//!
//! # Call outcomes
//!
//! | Situation | Response payload |
//! |---|---|
//! | item path unresolved or not indexable | `{ "error": { "message": "bad item path" } }` |
//! | member absent or not callable | `{ "error": { "message": "property is not a function" } }` |
//! | member read failed or panicked | `{ "error": <fault> }` |
//! | method returned or settled `Ok` | `{ "result": <value> }` |
//! | method returned or settled `Err`, or panicked | `{ "error": <fault> }` |

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value as Json;
use tether_protocol::{
	CallOutcome, Direction, Envelope, Fault, MethodCall, PropertyRef, Request, Response,
};

use crate::registry::Registry;
use crate::resolve::resolve;
use crate::value::{Invocation, Value};

/// Response to a single request.
pub enum Reply {
	/// Ready to send now.
	Ready(Envelope),
	/// Resolves to the response once a deferred result settles.
	Pending(BoxFuture<'static, Envelope>),
}

impl Reply {
	/// Waits for the response envelope.
	pub async fn into_envelope(self) -> Envelope {
		match self {
			Reply::Ready(envelope) => envelope,
			Reply::Pending(future) => future.await,
		}
	}
}

impl std::fmt::Debug for Reply {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Reply::Ready(envelope) => f.debug_tuple("Ready").field(envelope).finish(),
			Reply::Pending(_) => f.write_str("Pending"),
		}
	}
}

/// Answers protocol requests against a registry.
pub struct Dispatcher {
	registry: Arc<Registry>,
	descriptor: Json,
}

impl Dispatcher {
	pub fn new(registry: Arc<Registry>, descriptor: Json) -> Self {
		Self {
			registry,
			descriptor,
		}
	}

	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	pub fn descriptor(&self) -> &Json {
		&self.descriptor
	}

	/// Handles one inbound message.
	///
	/// Returns `None` for anything that is not a well-formed request of this
	/// protocol: foreign traffic, responses, unknown operations, and requests
	/// with unusable payloads are all dropped without a reply.
	pub fn dispatch(&self, text: &str) -> Option<Reply> {
		let envelope = match Envelope::parse(text) {
			Ok(envelope) => envelope,
			Err(e) => {
				tracing::trace!("Ignoring non-protocol message: {}", e);
				return None;
			}
		};

		match envelope.direction() {
			Ok(Direction::Request) => {}
			Ok(Direction::Response) => {
				tracing::trace!(id = %envelope.id, "Ignoring response envelope");
				return None;
			}
			Err(e) => {
				tracing::debug!(id = %envelope.id, "Ignoring envelope: {}", e);
				return None;
			}
		}

		let id = envelope.id.clone();
		match envelope.into_request() {
			Ok(request) => Some(self.handle(id, request)),
			Err(e) => {
				tracing::debug!(%id, "Dropping malformed request: {}", e);
				None
			}
		}
	}

	/// Performs a decoded request.
	pub fn handle(&self, id: String, request: Request) -> Reply {
		tracing::debug!(%id, operation = %request.operation(), "Handling request");

		let response = match request {
			Request::ExposedInterface => Response::ExposedInterface(self.descriptor.clone()),
			Request::ExposedItems => Response::ExposedItems(
				self.registry.identities().iter().map(|id| id.to_string()).collect(),
			),
			Request::FetchItemProperty(prop) => Response::FetchItemProperty(self.fetch(&prop)),
			Request::CallItemMethod(call) => match self.call(call) {
				Invocation::Immediate(result) => call_response(result),
				Invocation::Deferred(future) => {
					let future = AssertUnwindSafe(future).catch_unwind();
					return Reply::Pending(Box::pin(async move {
						let result = future.await.unwrap_or_else(|panic| Err(panic_fault(panic)));
						tracing::debug!(%id, ok = result.is_ok(), "Deferred call settled");
						Envelope::response(id, call_response(result))
					}));
				}
			},
		};

		Reply::Ready(Envelope::response(id, response))
	}

	/// Reads a property. Every failure is reported as absent, including a
	/// panic in host code along the path.
	pub fn fetch(&self, prop: &PropertyRef) -> Option<Json> {
		catch_unwind(AssertUnwindSafe(|| self.read(prop))).unwrap_or_else(|panic| {
			panic_fault(panic);
			None
		})
	}

	fn read(&self, prop: &PropertyRef) -> Option<Json> {
		let owner = resolve(&self.registry, prop.item_path.as_slice()).filter(Value::is_indexable)?;
		match owner.member(&prop.prop_name) {
			Ok(value) => value?.to_json(),
			Err(fault) => {
				tracing::debug!(prop = %prop.prop_name, %fault, "Property read failed");
				None
			}
		}
	}

	/// Invokes a method, turning every failure into a fault.
	///
	/// Panics in getters or in the method itself become faults. A deferred
	/// invocation is returned as-is; panics while polling it are caught by
	/// [`handle`](Self::handle).
	pub fn call(&self, call: MethodCall) -> Invocation {
		catch_unwind(AssertUnwindSafe(|| self.invoke(call)))
			.unwrap_or_else(|panic| Invocation::Immediate(Err(panic_fault(panic))))
	}

	fn invoke(&self, call: MethodCall) -> Invocation {
		let Some(receiver) = resolve(&self.registry, call.item_path.as_slice()).filter(Value::is_indexable)
		else {
			return Invocation::Immediate(Err(Fault::bad_item_path()));
		};

		let member = match receiver.member(&call.prop_name) {
			Ok(Some(member)) => member,
			Ok(None) => return Invocation::Immediate(Err(Fault::not_a_function())),
			Err(fault) => return Invocation::Immediate(Err(fault)),
		};
		let Some(method) = member.as_method() else {
			return Invocation::Immediate(Err(Fault::not_a_function()));
		};

		method.invoke(&receiver, call.args)
	}
}

fn call_response(result: Result<Json, Fault>) -> Response {
	Response::CallItemMethod(CallOutcome::from(result))
}

fn panic_fault(panic: Box<dyn Any + Send>) -> Fault {
	let message = if let Some(s) = panic.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"host code panicked".to_string()
	};
	tracing::warn!("Host code panicked: {}", message);
	Fault::new(message)
}

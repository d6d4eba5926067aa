//! Objects hosted by `tether serve`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::{Value as Json, json};
use tether::{
	Exposed, Fault, InterfaceDescriptor, Method, Record, Registry, TypeDescriptor, Value,
	parse_args,
};

/// Calculator with synchronous, deferred, and failing methods.
pub fn calculator() -> Record {
	Record::new()
		.with("name", json!("calculator"))
		.nested(
			"info",
			Record::new()
				.with("version", json!(env!("CARGO_PKG_VERSION")))
				.with("operations", json!(["add", "slowAdd", "divide"])),
		)
		.method("add", |_, args| {
			let (a, b): (f64, f64) = parse_args(args)?;
			Ok(json!(a + b))
		})
		.method("divide", |_, args| {
			let (a, b): (f64, f64) = parse_args(args)?;
			if b == 0.0 {
				return Err(Fault::new("division by zero"));
			}
			Ok(json!(a / b))
		})
		.deferred_method("slowAdd", |_, args| async move {
			let (a, b, delay_ms): (f64, f64, u64) = if args.len() == 2 {
				let (a, b) = parse_args(args)?;
				(a, b, 500)
			} else {
				parse_args(args)?
			};
			tokio::time::sleep(Duration::from_millis(delay_ms)).await;
			Ok::<_, Fault>(json!(a + b))
		})
}

/// Counter whose state lives on the host.
#[derive(Debug, Default)]
pub struct Counter {
	count: AtomicI64,
}

impl Counter {
	pub fn count(&self) -> i64 {
		self.count.load(Ordering::SeqCst)
	}

	fn bound(this: &Value) -> Result<&Counter, Fault> {
		this.downcast_ref::<Counter>()
			.ok_or_else(|| Fault::new("receiver is not a counter"))
	}
}

impl Exposed for Counter {
	fn get(&self, name: &str) -> Result<Option<Value>, Fault> {
		let member: Value = match name {
			"count" => json!(self.count()).into(),
			"increment" => Method::sync(|this, args| {
				let by = if args.is_empty() { 1 } else { parse_args::<(i64,)>(args)?.0 };
				let counter = Counter::bound(this)?;
				Ok(json!(counter.count.fetch_add(by, Ordering::SeqCst) + by))
			})
			.into(),
			"reset" => Method::sync(|this, _| {
				Counter::bound(this)?.count.store(0, Ordering::SeqCst);
				Ok(Json::Null)
			})
			.into(),
			_ => return Ok(None),
		};
		Ok(Some(member))
	}

	fn snapshot(&self) -> Json {
		json!({ "count": self.count() })
	}
}

/// Describes what [`expose_all`] registers.
pub fn descriptor() -> InterfaceDescriptor {
	use TypeDescriptor as T;

	let binary = || T::function([T::Number, T::Number], T::Number);
	InterfaceDescriptor::new()
		.item(
			"calculator",
			T::object([
				("name", T::String),
				(
					"info",
					T::object([("version", T::String), ("operations", T::array(T::String))]),
				),
				("add", binary()),
				("divide", binary()),
				(
					"slowAdd",
					T::function([T::Number, T::Number, T::Number], T::deferred(T::Number)),
				),
			]),
		)
		.item(
			"counter",
			T::object([
				("count", T::Number),
				("increment", T::function([T::Number], T::Number)),
				("reset", T::function([], T::Null)),
			]),
		)
}

/// Registers the calculator and a counter; returns their identities by name.
pub fn expose_all(registry: &Registry) -> Vec<(&'static str, tether::Identity)> {
	vec![
		("calculator", registry.expose(calculator())),
		("counter", registry.expose(Value::object(Counter::default()))),
	]
}

//! End-to-end tests: a bridge and a client connection over real transports.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value as Json, json};
use tether::transport::{MessageBus, PipeTransport, Transport, TransportParts, TransportReceiver, memory};
use tether::{
	Bridge, Connection, Error, Exposed, Fault, InterfaceDescriptor, Method, Record, Registry,
	TypeDescriptor, Value, parse_args,
};
use tokio::sync::oneshot;

fn start_bridge(bridge: Bridge) -> Arc<Bridge> {
	let bridge = Arc::new(bridge);
	let runner = Arc::clone(&bridge);
	tokio::spawn(async move { runner.run().await });
	bridge
}

fn start_client(parts: TransportParts) -> Arc<Connection> {
	let connection = Arc::new(Connection::new(parts).with_request_timeout(Duration::from_secs(5)));
	let runner = Arc::clone(&connection);
	tokio::spawn(async move { runner.run().await });
	connection
}

fn greeter() -> Record {
	Record::new()
		.with("name", json!("greeter"))
		.nested("settings", Record::new().with("volume", json!(11)))
		.method("greet", |_, args| {
			let (who,): (String,) = parse_args(args)?;
			Ok(json!(format!("hi {who}")))
		})
}

/// Host object with interior state, mutated through its own methods.
#[derive(Default)]
struct Counter {
	count: AtomicI64,
}

impl Counter {
	fn bound(this: &Value) -> Result<&Counter, Fault> {
		this.downcast_ref::<Counter>()
			.ok_or_else(|| Fault::new("receiver is not a counter"))
	}
}

impl Exposed for Counter {
	fn get(&self, name: &str) -> Result<Option<Value>, Fault> {
		let value: Value = match name {
			"count" => json!(self.count.load(Ordering::SeqCst)).into(),
			"increment" => Method::sync(|this, args| {
				let by = if args.is_empty() { 1 } else { parse_args::<(i64,)>(args)?.0 };
				let counter = Counter::bound(this)?;
				Ok(json!(counter.count.fetch_add(by, Ordering::SeqCst) + by))
			})
			.into(),
			_ => return Ok(None),
		};
		Ok(Some(value))
	}

	fn snapshot(&self) -> Json {
		json!({ "count": self.count.load(Ordering::SeqCst) })
	}
}

#[tokio::test]
async fn greet_round_trip() {
	let (host, client) = memory::pair();
	let bridge = start_bridge(Bridge::new(host));
	let id = bridge.expose(greeter());
	let connection = start_client(client);

	assert_eq!(connection.items().await.unwrap(), vec![id.to_string()]);
	assert_eq!(connection.describe().await.unwrap(), json!({}));

	let item = connection.item(&*id);
	let greeting: String = item.call("greet", vec![json!("Ann")]).await.unwrap();
	assert_eq!(greeting, "hi Ann");

	assert_eq!(item.get::<String>("name").await.unwrap().as_deref(), Some("greeter"));
	assert_eq!(item.get::<Json>("missing").await.unwrap(), None);
	assert_eq!(item.member("settings").get::<u32>("volume").await.unwrap(), Some(11));
	assert_eq!(
		item.get::<Json>("settings").await.unwrap(),
		Some(json!({"volume": 11}))
	);
}

#[tokio::test]
async fn call_failures_become_remote_errors() {
	let (host, client) = memory::pair();
	let bridge = start_bridge(Bridge::new(host));
	let id = bridge.expose(greeter().method("fail", |_, _| Err(Fault::new("nope").with_stack("at fail"))));
	let connection = start_client(client);
	let item = connection.item(&*id);

	let err = connection.item("unknown").invoke("greet", vec![]).await.unwrap_err();
	assert_eq!(err.fault().and_then(Fault::message), Some("bad item path"));

	let err = item.member("name").invoke("greet", vec![]).await.unwrap_err();
	assert_eq!(err.fault().and_then(Fault::message), Some("bad item path"));

	let err = item.invoke("name", vec![]).await.unwrap_err();
	assert_eq!(err.fault().and_then(Fault::message), Some("property is not a function"));

	let err = item.invoke("fail", vec![]).await.unwrap_err();
	assert!(matches!(err, Error::Remote(_)));
	assert_eq!(err.stack_trace(), Some("at fail"));

	let err = item.invoke("greet", vec![json!(5)]).await.unwrap_err();
	assert!(err.fault().and_then(Fault::message).unwrap().starts_with("invalid arguments"));
}

#[tokio::test]
async fn deferred_calls_complete_out_of_order() {
	let (host, client) = memory::pair();
	let bridge = start_bridge(Bridge::new(host));

	let gates: Arc<Mutex<HashMap<String, oneshot::Receiver<()>>>> = Arc::default();
	let mut releases = HashMap::new();
	for tag in ["first", "second"] {
		let (tx, rx) = oneshot::channel();
		gates.lock().insert(tag.to_string(), rx);
		releases.insert(tag, tx);
	}

	let id = bridge.expose(
		Record::new()
			.deferred_method("wait", move |_, args| {
				let gates = Arc::clone(&gates);
				async move {
					let (tag,): (String,) = parse_args(args)?;
					let gate = gates.lock().remove(&tag).ok_or_else(|| Fault::new("no gate"))?;
					gate.await.map_err(|_| Fault::new("gate dropped"))?;
					Ok::<_, Fault>(json!(tag))
				}
			})
			.method("now", |_, _| Ok(json!("now"))),
	);
	let connection = start_client(client);
	let item = connection.item(&*id);

	let first = tokio::spawn({
		let item = item.clone();
		async move { item.call::<String>("wait", vec![json!("first")]).await }
	});
	let second = tokio::spawn({
		let item = item.clone();
		async move { item.call::<String>("wait", vec![json!("second")]).await }
	});

	// Synchronous calls are not held up by pending deferred ones.
	assert_eq!(item.call::<String>("now", vec![]).await.unwrap(), "now");
	assert_eq!(connection.pending_requests(), 2);

	releases.remove("second").unwrap().send(()).unwrap();
	assert_eq!(second.await.unwrap().unwrap(), "second");
	assert!(!first.is_finished());

	releases.remove("first").unwrap().send(()).unwrap();
	assert_eq!(first.await.unwrap().unwrap(), "first");
	assert_eq!(connection.pending_requests(), 0);
}

#[tokio::test]
async fn host_object_state() {
	let (host, client) = memory::pair();
	let bridge = start_bridge(Bridge::new(host));
	let id = bridge.expose(Value::object(Counter::default()));
	let holder = bridge.expose(Record::new().with("counter", bridge.registry().lookup(&id).unwrap()));
	let connection = start_client(client);

	let counter = connection.item(&*id);
	assert_eq!(counter.call::<i64>("increment", vec![]).await.unwrap(), 1);
	assert_eq!(counter.call::<i64>("increment", vec![json!(4)]).await.unwrap(), 5);
	assert_eq!(counter.get::<i64>("count").await.unwrap(), Some(5));

	// Same object reached through another item; the receiver is still the counter.
	let nested = connection.item(&*holder).member("counter");
	assert_eq!(nested.call::<i64>("increment", vec![]).await.unwrap(), 6);
	assert_eq!(
		connection.item(&*holder).get::<Json>("counter").await.unwrap(),
		Some(json!({"count": 6}))
	);

	let local = bridge.registry().get_as::<Counter>(&id).unwrap();
	assert_eq!(local.count.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn descriptor_and_custom_identities() {
	let next = AtomicUsize::new(0);
	let descriptor = InterfaceDescriptor::new().item(
		"greeter",
		TypeDescriptor::object([(
			"greet",
			TypeDescriptor::function([TypeDescriptor::String], TypeDescriptor::String),
		)]),
	);

	let (host, client) = memory::pair();
	let bridge = start_bridge(
		Bridge::builder(host)
			.descriptor(&descriptor)
			.identities(move || format!("item-{}", next.fetch_add(1, Ordering::SeqCst)))
			.build(),
	);
	assert_eq!(&*bridge.expose(greeter()), "item-0");
	assert_eq!(&*bridge.expose(greeter()), "item-1");

	let connection = start_client(client);
	assert_eq!(connection.describe().await.unwrap(), descriptor.to_value());
	assert_eq!(connection.items().await.unwrap(), ["item-0", "item-1"]);
}

#[tokio::test]
async fn bridges_share_a_registry() {
	let registry = Arc::new(Registry::new());
	let (host_a, client_a) = memory::pair();
	let (host_b, client_b) = memory::pair();
	let a = start_bridge(Bridge::builder(host_a).registry(Arc::clone(&registry)).build());
	let b = start_bridge(Bridge::builder(host_b).registry(Arc::clone(&registry)).build());

	let id = a.expose(greeter());
	assert!(Arc::ptr_eq(a.registry(), b.registry()));

	let connection = start_client(client_b);
	assert_eq!(connection.items().await.unwrap(), vec![id.to_string()]);
	let greeting: String = connection.item(&*id).call("greet", vec![json!("Bo")]).await.unwrap();
	assert_eq!(greeting, "hi Bo");

	drop(client_a);
}

#[tokio::test]
async fn bus_with_foreign_traffic() {
	let bus = MessageBus::new();
	let bridge = start_bridge(Bridge::new(bus.endpoint()));
	let id = bridge.expose(greeter());
	let alice = start_client(bus.endpoint());
	let bob = start_client(bus.endpoint());

	bus.publish("not json at all");
	bus.publish(r#"{"jsonrpc":"2.0","method":"ping","id":7}"#);
	bus.publish(json!({"protocol": "other/1", "type": "exposed_items_request", "id": "x"}).to_string());

	let alice_item = alice.item(&*id);
	let bob_item = bob.item(&*id);
	let (a, b) = tokio::join!(
		alice_item.call::<String>("greet", vec![json!("Alice")]),
		bob_item.call::<String>("greet", vec![json!("Bob")]),
	);
	assert_eq!(a.unwrap(), "hi Alice");
	assert_eq!(b.unwrap(), "hi Bob");
	assert_eq!(alice.pending_requests(), 0);
	assert_eq!(bob.pending_requests(), 0);
}

#[tokio::test]
async fn pipe_round_trip() {
	let (host_io, client_io) = tokio::io::duplex(64 * 1024);
	let (host_read, host_write) = tokio::io::split(host_io);
	let (client_read, client_write) = tokio::io::split(client_io);

	let (host, host_rx) = PipeTransport::new(host_write, host_read);
	let (client, client_rx) = PipeTransport::new(client_write, client_read);

	let bridge = start_bridge(Bridge::new(host.into_transport_parts(host_rx)));
	let id = bridge.expose(
		greeter().deferred_method("slow_echo", |_, args| async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			Ok::<_, Fault>(Json::Array(args))
		}),
	);
	let connection = start_client(client.into_transport_parts(client_rx));
	let item = connection.item(&*id);

	let big = "x".repeat(200 * 1024);
	let echoed: Vec<String> = item.call("slow_echo", vec![json!(&big)]).await.unwrap();
	assert_eq!(echoed, vec![big]);
	assert_eq!(item.call::<String>("greet", vec![json!("Ann")]).await.unwrap(), "hi Ann");
}

#[tokio::test]
async fn run_twice_is_rejected() {
	let (host, client) = memory::pair();
	let bridge = Bridge::new(host);
	drop(client);

	bridge.run().await.unwrap();
	assert!(matches!(bridge.run().await, Err(Error::AlreadyRunning)));
}

#[tokio::test]
async fn embedded_dispatch_loop() {
	let (host, client) = memory::pair();
	let bridge = Bridge::new(host);
	let id = bridge.expose(greeter());

	let text = tether::Envelope::request(
		"manual",
		&tether::Request::ExposedItems,
	)
	.to_text()
	.unwrap();
	let reply = bridge.dispatcher().dispatch(&text).unwrap().into_envelope().await;
	assert_eq!(reply.id, "manual");
	assert_eq!(reply.payload, Some(json!([&*id])));

	drop(client);
}

#[tokio::test]
async fn half_close_flushes_every_response() {
	let (host, mut client) = memory::pair();
	let bridge = Arc::new(Bridge::new(host));
	let id = bridge.expose(
		Record::new()
			.method("now", |_, _| Ok(json!("now")))
			.deferred_method("later", |_, _| async {
				tokio::time::sleep(Duration::from_millis(50)).await;
				Ok::<_, Fault>(json!("later"))
			}),
	);
	let runner = tokio::spawn({
		let bridge = Arc::clone(&bridge);
		async move { bridge.run().await }
	});

	for (token, method) in [("1", "now"), ("2", "later")] {
		let request = tether::Request::CallItemMethod(tether::MethodCall {
			item_path: vec![id.to_string()],
			prop_name: method.into(),
			args: vec![],
		});
		let text = tether::Envelope::request(token, &request).to_text().unwrap();
		client.sender.send(text).await.unwrap();
	}
	// Close only the client's outbound half; its inbound stays open.
	let TransportParts {
		sender,
		mut receiver,
		mut message_rx,
	} = client;
	drop(sender);
	tokio::spawn(async move { receiver.run().await });

	let mut replies = HashMap::new();
	tokio::time::timeout(Duration::from_secs(5), async {
		while replies.len() < 2 {
			let text = message_rx.recv().await.expect("bridge closed before replying");
			let envelope = tether::Envelope::parse(&text).unwrap();
			replies.insert(envelope.id, envelope.payload);
		}
	})
	.await
	.expect("timed out waiting for replies");

	assert_eq!(replies["1"], Some(json!({ "result": "now" })));
	assert_eq!(replies["2"], Some(json!({ "result": "later" })));
	runner.await.unwrap().unwrap();
}

//! Host endpoint binding a dispatcher to a transport.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value as Json;
use tether_protocol::{Envelope, InterfaceDescriptor};
use futures_util::future::BoxFuture;
use tether_runtime::{Error, OutboundWriter, Result, Transport, TransportParts, TransportReceiver};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::dispatch::{Dispatcher, Reply};
use crate::registry::{Identity, IdentitySource, Registry};
use crate::value::Value;

/// Transport halves, taken by the message loop when it starts.
struct Io {
	sender: Box<dyn Transport>,
	receiver: Box<dyn TransportReceiver>,
	message_rx: mpsc::UnboundedReceiver<String>,
	outbound_rx: mpsc::UnboundedReceiver<String>,
}

/// Exposes host values to a peer over one transport.
///
/// ```ignore
/// let bridge = Arc::new(Bridge::new(parts));
/// let id = bridge.expose(Record::new().method("greet", greet));
/// tokio::spawn({
///     let bridge = Arc::clone(&bridge);
///     async move { bridge.run().await }
/// });
/// ```
pub struct Bridge {
	dispatcher: Dispatcher,
	/// Responses queued for the writer task
	outbound_tx: mpsc::UnboundedSender<String>,
	/// Transport halves, present until `run()` takes them
	io: Mutex<Option<Io>>,
}

impl Bridge {
	/// Bridge with a private registry and an empty descriptor.
	pub fn new(parts: TransportParts) -> Self {
		Self::builder(parts).build()
	}

	pub fn builder(parts: TransportParts) -> BridgeBuilder {
		BridgeBuilder {
			parts,
			descriptor: Json::Object(Default::default()),
			registry: None,
		}
	}

	/// Registers a value and returns the identity the peer addresses it by.
	pub fn expose(&self, value: impl Into<Value>) -> Identity {
		self.dispatcher.registry().expose(value)
	}

	pub fn registry(&self) -> &Arc<Registry> {
		self.dispatcher.registry()
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Runs the message loop until the peer goes away.
	///
	/// Spawns the transport reader and writer, then answers every inbound
	/// request. When inbound closes, deferred results still in flight are
	/// awaited and every queued response is written before this returns.
	/// Returns [`Error::AlreadyRunning`] if the loop was started before.
	pub async fn run(&self) -> Result<()> {
		let Io {
			sender,
			mut receiver,
			mut message_rx,
			outbound_rx,
		} = self.io.lock().take().ok_or(Error::AlreadyRunning)?;

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::error!("Transport read error: {}", e);
			}
		});

		let writer = OutboundWriter::spawn(sender, outbound_rx);

		tracing::debug!(items = self.registry().len(), "Bridge running");
		let mut pending = JoinSet::new();
		while let Some(text) = message_rx.recv().await {
			match self.dispatcher.dispatch(&text) {
				Some(Reply::Ready(envelope)) => post(&self.outbound_tx, envelope),
				Some(Reply::Pending(future)) => {
					pending.spawn(settle(self.outbound_tx.clone(), future));
				}
				None => {}
			}
			while pending.try_join_next().is_some() {}
		}

		let _ = reader_handle.await;
		if !pending.is_empty() {
			tracing::debug!(pending = pending.len(), "Awaiting deferred responses");
		}
		while pending.join_next().await.is_some() {}
		writer.finish().await;
		tracing::debug!("Bridge stopped: transport closed");
		Ok(())
	}

	/// Handles one inbound message, queueing its response if it has one.
	///
	/// Deferred results are awaited on a spawned task, so this must be called
	/// from within a tokio runtime.
	pub fn handle_message(&self, text: &str) {
		match self.dispatcher.dispatch(text) {
			Some(Reply::Ready(envelope)) => post(&self.outbound_tx, envelope),
			Some(Reply::Pending(future)) => {
				tokio::spawn(settle(self.outbound_tx.clone(), future));
			}
			None => {}
		}
	}
}

/// Awaits a deferred result and queues its response.
async fn settle(outbound_tx: mpsc::UnboundedSender<String>, future: BoxFuture<'static, Envelope>) {
	post(&outbound_tx, future.await);
}

fn post(outbound_tx: &mpsc::UnboundedSender<String>, envelope: Envelope) {
	let text = match envelope.to_text() {
		Ok(text) => text,
		Err(e) => {
			tracing::error!(id = %envelope.id, "Failed to encode response: {}", e);
			return;
		}
	};
	if outbound_tx.send(text).is_err() {
		tracing::warn!(id = %envelope.id, "Dropping response: outbound channel closed");
	}
}

/// Configures a [`Bridge`] before it starts.
pub struct BridgeBuilder {
	parts: TransportParts,
	descriptor: Json,
	registry: Option<Arc<Registry>>,
}

impl BridgeBuilder {
	/// Describes the exposed interface to peers that ask for it.
	pub fn descriptor(self, descriptor: &InterfaceDescriptor) -> Self {
		self.descriptor_value(descriptor.to_value())
	}

	/// Sets the descriptor as free-form JSON, returned to peers verbatim.
	pub fn descriptor_value(mut self, descriptor: Json) -> Self {
		self.descriptor = descriptor;
		self
	}

	/// Serves items from a registry shared with other bridges.
	pub fn registry(mut self, registry: Arc<Registry>) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Uses a private registry drawing identities from `source`.
	///
	/// Replaces any registry set earlier.
	pub fn identities(mut self, source: impl IdentitySource) -> Self {
		self.registry = Some(Arc::new(Registry::with_identities(source)));
		self
	}

	pub fn build(self) -> Bridge {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = self.parts;
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let registry = self.registry.unwrap_or_default();

		Bridge {
			dispatcher: Dispatcher::new(registry, self.descriptor),
			outbound_tx,
			io: Mutex::new(Some(Io {
				sender,
				receiver,
				message_rx,
				outbound_rx,
			})),
		}
	}
}

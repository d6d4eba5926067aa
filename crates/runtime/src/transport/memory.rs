//! In-process transports.
//!
//! - [`pair`] connects exactly two endpoints, like a socket pair.
//! - [`MessageBus`] is a shared pub/sub channel: every endpoint sees every
//!   message published by the others, so bridges and clients on the bus must
//!   filter traffic that is not addressed to them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

/// Default number of messages a lagging bus subscriber may fall behind.
const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Endpoint id used by [`MessageBus::publish`].
const EXTERNAL_PUBLISHER: u64 = 0;

/// Creates two connected in-process endpoints.
pub fn pair() -> (TransportParts, TransportParts) {
	let (a_wire_tx, a_wire_rx) = mpsc::unbounded_channel();
	let (b_wire_tx, b_wire_rx) = mpsc::unbounded_channel();
	(endpoint(a_wire_tx, b_wire_rx), endpoint(b_wire_tx, a_wire_rx))
}

fn endpoint(outbound: mpsc::UnboundedSender<String>, inbound: mpsc::UnboundedReceiver<String>) -> TransportParts {
	let (message_tx, message_rx) = mpsc::unbounded_channel();
	TransportParts::new(
		MemorySender {
			target: Target::Wire(outbound),
		},
		MemoryReceiver {
			source: Source::Wire(inbound),
			message_tx,
		},
		message_rx,
	)
}

/// Shared in-process pub/sub channel.
#[derive(Clone)]
pub struct MessageBus {
	tx: broadcast::Sender<(u64, String)>,
	next_endpoint: Arc<AtomicU64>,
}

impl Default for MessageBus {
	fn default() -> Self {
		Self::new()
	}
}

impl MessageBus {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_BUS_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity);
		Self {
			tx,
			next_endpoint: Arc::new(AtomicU64::new(EXTERNAL_PUBLISHER + 1)),
		}
	}

	/// Attaches a new endpoint to the bus.
	///
	/// The endpoint receives messages published after this call by anyone but itself.
	pub fn endpoint(&self) -> TransportParts {
		let id = self.next_endpoint.fetch_add(1, Ordering::SeqCst);
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		TransportParts::new(
			MemorySender {
				target: Target::Bus {
					endpoint: id,
					tx: self.tx.clone(),
				},
			},
			MemoryReceiver {
				source: Source::Bus {
					endpoint: id,
					rx: self.tx.subscribe(),
				},
				message_tx,
			},
			message_rx,
		)
	}

	/// Publishes a message to every endpoint, as if from an unrelated sender.
	pub fn publish(&self, message: impl Into<String>) {
		let _ = self.tx.send((EXTERNAL_PUBLISHER, message.into()));
	}
}

enum Target {
	Wire(mpsc::UnboundedSender<String>),
	Bus {
		endpoint: u64,
		tx: broadcast::Sender<(u64, String)>,
	},
}

/// Sending half of an in-process endpoint.
pub struct MemorySender {
	target: Target,
}

#[async_trait]
impl Transport for MemorySender {
	async fn send(&mut self, message: String) -> Result<()> {
		match &self.target {
			Target::Wire(tx) => tx.send(message).map_err(|_| Error::ChannelClosed),
			Target::Bus { endpoint, tx } => {
				// No subscribers is not an error on a pub/sub channel.
				if tx.send((*endpoint, message)).is_err() {
					tracing::trace!(endpoint, "Published to bus with no subscribers");
				}
				Ok(())
			}
		}
	}
}

enum Source {
	Wire(mpsc::UnboundedReceiver<String>),
	Bus {
		endpoint: u64,
		rx: broadcast::Receiver<(u64, String)>,
	},
}

/// Receiving half of an in-process endpoint.
pub struct MemoryReceiver {
	source: Source,
	message_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl TransportReceiver for MemoryReceiver {
	async fn run(&mut self) -> Result<()> {
		loop {
			let message = match &mut self.source {
				Source::Wire(rx) => match rx.recv().await {
					Some(message) => message,
					None => return Ok(()),
				},
				Source::Bus { endpoint, rx } => match rx.recv().await {
					Ok((from, _)) if from == *endpoint => continue,
					Ok((_, message)) => message,
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(endpoint = *endpoint, skipped, "Bus subscriber lagged, messages dropped");
						continue;
					}
					Err(broadcast::error::RecvError::Closed) => return Ok(()),
				},
			};

			if self.message_tx.send(message).is_err() {
				return Ok(());
			}
		}
	}
}

//! Transport layer for tether endpoints.
//!
//! A transport moves serialized envelopes (strings) between two peers and
//! knows nothing about the protocol. Each endpoint is split into:
//!
//! - a [`Transport`] that sends outbound messages,
//! - a [`TransportReceiver`] that reads inbound messages and forwards them into
//!   an unbounded channel until the peer goes away,
//! - the receiving half of that channel, consumed by exactly one dispatcher.
//!
//! [`TransportParts`] bundles the three so bridges and connections can take
//! ownership of an endpoint in one move.
//!
//! Bindings:
//!
//! - [`PipeTransport`] - length-prefixed frames over any async reader/writer
//!   (child process stdio, sockets)
//! - [`memory::pair`] and [`MessageBus`] - in-process channels
//! - [`websocket`] - text frames over `tokio-tungstenite`

#[cfg(test)]
mod tests;

pub mod memory;
mod pipe;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::Result;

pub use memory::{MemoryReceiver, MemorySender, MessageBus};
pub use pipe::{DEFAULT_MAX_FRAME_LEN, PipeTransport, PipeTransportReceiver, PipeTransportSender};
pub use websocket::{WebSocketTransportReceiver, WebSocketTransportSender};

/// Outbound half of an endpoint.
#[async_trait]
pub trait Transport: Send + 'static {
	/// Delivers one serialized envelope to the peer.
	async fn send(&mut self, message: String) -> Result<()>;
}

/// Inbound half of an endpoint.
#[async_trait]
pub trait TransportReceiver: Send + 'static {
	/// Reads until the peer closes, forwarding each message to the endpoint's channel.
	///
	/// Returns `Ok(())` on orderly shutdown (peer closed or consumer dropped).
	async fn run(&mut self) -> Result<()>;
}

/// Everything an endpoint needs to talk to its peer.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<String>,
}

impl TransportParts {
	pub fn new(
		sender: impl Transport,
		receiver: impl TransportReceiver,
		message_rx: mpsc::UnboundedReceiver<String>,
	) -> Self {
		Self {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		}
	}
}

/// Writer task moving an endpoint's outbound queue onto its transport.
///
/// The queue's senders live as long as the endpoint, so the task is stopped
/// explicitly with [`finish`](Self::finish), which first flushes whatever is
/// already queued.
pub struct OutboundWriter {
	stop_tx: oneshot::Sender<()>,
	handle: JoinHandle<()>,
}

impl OutboundWriter {
	pub fn spawn(mut sender: Box<dyn Transport>, mut outbound_rx: mpsc::UnboundedReceiver<String>) -> Self {
		let (stop_tx, mut stop_rx) = oneshot::channel();
		let handle = tokio::spawn(async move {
			loop {
				tokio::select! {
					message = outbound_rx.recv() => {
						let Some(message) = message else {
							return;
						};
						if !write(sender.as_mut(), message).await {
							return;
						}
					}
					_ = &mut stop_rx => break,
				}
			}

			outbound_rx.close();
			while let Some(message) = outbound_rx.recv().await {
				if !write(sender.as_mut(), message).await {
					return;
				}
			}
		});

		Self { stop_tx, handle }
	}

	/// Sends everything queued so far, then waits for the task to exit.
	///
	/// Messages queued after this call are rejected.
	pub async fn finish(self) {
		let _ = self.stop_tx.send(());
		let _ = self.handle.await;
	}
}

async fn write(sender: &mut dyn Transport, message: String) -> bool {
	match sender.send(message).await {
		Ok(()) => true,
		Err(e) => {
			tracing::error!("Transport write error: {}", e);
			false
		}
	}
}

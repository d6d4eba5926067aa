//! Client side of the tether protocol.
//!
//! This module implements the request/response correlation layer on top of the transport.
//! It handles:
//! - Generating a fresh correlation token per request
//! - Correlating responses with pending requests
//! - Ignoring traffic that is not a response to one of our requests
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send_request`] (or a typed helper)
//! 2. Connection generates a token and registers a oneshot channel under it
//! 3. Request envelope is serialized and queued for the writer task
//! 4. Caller awaits the oneshot receiver
//! 5. Message loop receives the response envelope from the transport
//! 6. Response is matched by token and sent through the oneshot channel
//!
//! On a shared channel other clients' responses arrive too; tokens we did not
//! issue are skipped silently.


use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tether_protocol::{Direction, Envelope, MethodCall, PropertyRef, Request, Response};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::remote::RemoteItem;
use crate::transport::{OutboundWriter, Transport, TransportParts, TransportReceiver};

/// Pending requests keyed by correlation token.
type CallbackMap = Arc<DashMap<String, oneshot::Sender<Response>>>;

/// RAII guard ensuring callback cleanup when a request future is dropped.
struct CancelGuard {
	id: String,
	callbacks: CallbackMap,
	completed: bool,
}

impl CancelGuard {
	fn new(id: String, callbacks: CallbackMap) -> Self {
		Self {
			id,
			callbacks,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if self.callbacks.remove(&self.id).is_some() {
			tracing::debug!(id = %self.id, "CancelGuard: removed orphaned callback");
		}
	}
}

/// Future returned by [`Connection::send_request`] with automatic cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Response>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Response>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				Poll::Ready(result.map_err(|_| Error::ChannelClosed))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Transport halves taken by [`Connection::run`].
struct Io {
	sender: Box<dyn Transport>,
	receiver: Box<dyn TransportReceiver>,
	message_rx: mpsc::UnboundedReceiver<String>,
	outbound_rx: mpsc::UnboundedReceiver<String>,
}

/// Client connection to a bridge.
///
/// Create it from [`TransportParts`], spawn [`run`](Self::run), then issue
/// requests from any task.
pub struct Connection {
	/// Pending request callbacks keyed by correlation token
	callbacks: CallbackMap,
	/// Channel for sending outbound messages to the writer task
	outbound_tx: mpsc::UnboundedSender<String>,
	/// Transport halves, present until `run()` takes them
	io: Mutex<Option<Io>>,
	/// Upper bound on how long a single request waits for its response
	request_timeout: Option<Duration>,
}

impl Connection {
	/// Creates a connection over the given transport.
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			callbacks: Arc::new(DashMap::new()),
			outbound_tx,
			io: Mutex::new(Some(Io {
				sender,
				receiver,
				message_rx,
				outbound_rx,
			})),
			request_timeout: None,
		}
	}

	/// Fails requests that receive no response within `timeout`.
	///
	/// The host keeps running the call; only the local wait is abandoned.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);
		self
	}

	/// Number of requests still waiting for a response.
	pub fn pending_requests(&self) -> usize {
		self.callbacks.len()
	}

	/// Sends a request and awaits its correlated response.
	pub async fn send_request(&self, request: Request) -> Result<Response> {
		let id = uuid::Uuid::new_v4().simple().to_string();
		let operation = request.operation();

		tracing::debug!(%id, %operation, "Sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.insert(id.clone(), tx);
		let guard = CancelGuard::new(id.clone(), Arc::clone(&self.callbacks));

		let text = Envelope::request(id.clone(), &request).to_text()?;
		if self.outbound_tx.send(text).is_err() {
			tracing::error!("Failed to queue request: outbound channel closed");
			return Err(Error::ChannelClosed);
		}

		let response = ResponseFuture { rx, guard };
		let response = match self.request_timeout {
			Some(timeout) => tokio::time::timeout(timeout, response)
				.await
				.map_err(|_| Error::Timeout(format!("{operation} request {id} after {timeout:?}")))??,
			None => response.await?,
		};

		if response.operation() != operation {
			return Err(Error::ProtocolError(format!(
				"Expected {operation} response for {id}, got {}",
				response.operation()
			)));
		}
		Ok(response)
	}

	/// Fetches the interface descriptor configured on the bridge.
	pub async fn describe(&self) -> Result<Value> {
		match self.send_request(Request::ExposedInterface).await? {
			Response::ExposedInterface(descriptor) => Ok(descriptor),
			other => Err(unexpected(other)),
		}
	}

	/// Lists the identities currently exposed by the bridge.
	pub async fn items(&self) -> Result<Vec<String>> {
		match self.send_request(Request::ExposedItems).await? {
			Response::ExposedItems(items) => Ok(items),
			other => Err(unexpected(other)),
		}
	}

	/// Reads `prop` off the value at `item_path`. `None` means unreachable.
	pub async fn fetch(&self, item_path: Vec<String>, prop: &str) -> Result<Option<Value>> {
		let request = Request::FetchItemProperty(PropertyRef {
			item_path,
			prop_name: prop.to_string(),
		});
		match self.send_request(request).await? {
			Response::FetchItemProperty(value) => Ok(value),
			other => Err(unexpected(other)),
		}
	}

	/// Invokes `method` on the value at `item_path`.
	///
	/// A failure reported by the host becomes [`Error::Remote`].
	pub async fn call(&self, item_path: Vec<String>, method: &str, args: Vec<Value>) -> Result<Value> {
		let request = Request::CallItemMethod(MethodCall {
			item_path,
			prop_name: method.to_string(),
			args,
		});
		match self.send_request(request).await? {
			Response::CallItemMethod(outcome) => outcome.into_result().map_err(Error::Remote),
			other => Err(unexpected(other)),
		}
	}

	/// Returns a proxy for an exposed item.
	pub fn item(self: &Arc<Self>, identity: impl Into<String>) -> RemoteItem {
		RemoteItem::new(identity, Arc::clone(self))
	}

	/// Runs the message loop until the transport closes.
	///
	/// Spawns the transport reader and writer, then correlates every inbound
	/// response. Pending requests fail with [`Error::ChannelClosed`] once the
	/// loop ends.
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

		while let Some(text) = message_rx.recv().await {
			self.dispatch(&text);
		}

		let _ = reader_handle.await;
		writer.finish().await;
		self.callbacks.clear();
		Ok(())
	}

	/// Correlates one inbound message with a pending request.
	pub fn dispatch(&self, text: &str) {
		let envelope = match Envelope::parse(text) {
			Ok(envelope) => envelope,
			Err(e) => {
				tracing::trace!("Ignoring non-protocol message: {}", e);
				return;
			}
		};

		match envelope.direction() {
			Ok(Direction::Response) => {}
			Ok(Direction::Request) => return,
			Err(e) => {
				tracing::debug!("Ignoring envelope: {}", e);
				return;
			}
		}

		let Some((id, callback)) = self.callbacks.remove(&envelope.id) else {
			tracing::trace!(id = %envelope.id, "Response for unknown request (ignored)");
			return;
		};

		match envelope.into_response() {
			Ok(response) => {
				let _ = callback.send(response);
			}
			Err(e) => {
				// Dropping the callback fails the waiting request with ChannelClosed.
				tracing::error!(%id, "Failed to decode response: {}", e);
			}
		}
	}
}

fn unexpected(response: Response) -> Error {
	Error::ProtocolError(format!("Unexpected {} response", response.operation()))
}

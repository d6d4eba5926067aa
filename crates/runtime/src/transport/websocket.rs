//! WebSocket transport.
//!
//! Each envelope travels as one text frame. Binary frames are accepted when
//! they hold UTF-8 text; ping/pong is handled by tungstenite.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

/// Connects to a `ws://` or `wss://` endpoint.
pub async fn connect(url: &str) -> Result<TransportParts> {
	tracing::debug!(url, "Connecting WebSocket transport");
	let (stream, _response) = tokio_tungstenite::connect_async(url)
		.await
		.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?;
	Ok(into_transport_parts::<MaybeTlsStream<TcpStream>>(stream))
}

/// Completes the server side of a WebSocket handshake on an accepted stream.
pub async fn accept<S>(stream: S) -> Result<TransportParts>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	let stream = tokio_tungstenite::accept_async(stream).await?;
	Ok(into_transport_parts(stream))
}

/// Splits an established WebSocket into transport parts.
pub fn into_transport_parts<S>(stream: WebSocketStream<S>) -> TransportParts
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	let (sink, stream) = stream.split();
	let (message_tx, message_rx) = mpsc::unbounded_channel();
	TransportParts::new(
		WebSocketTransportSender { sink },
		WebSocketTransportReceiver { stream, message_tx },
		message_rx,
	)
}

/// Sending half of a WebSocket endpoint.
pub struct WebSocketTransportSender<S> {
	sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> Transport for WebSocketTransportSender<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	async fn send(&mut self, message: String) -> Result<()> {
		self.sink.send(Message::Text(message)).await?;
		Ok(())
	}
}

/// Receiving half of a WebSocket endpoint.
pub struct WebSocketTransportReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
	message_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl<S> TransportReceiver for WebSocketTransportReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	async fn run(&mut self) -> Result<()> {
		while let Some(frame) = self.stream.next().await {
			let text = match frame? {
				Message::Text(text) => text,
				Message::Binary(bytes) => match String::from_utf8(bytes) {
					Ok(text) => text,
					Err(_) => {
						tracing::debug!("Ignoring non-UTF-8 binary frame");
						continue;
					}
				},
				Message::Close(_) => {
					tracing::debug!("WebSocket closed by peer");
					return Ok(());
				}
				Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
			};

			if self.message_tx.send(text).is_err() {
				return Ok(());
			}
		}
		Ok(())
	}
}

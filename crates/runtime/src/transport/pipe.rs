//! Length-prefixed framing over async byte streams.
//!
//! Frame format: `[u32 little-endian length][UTF-8 JSON text]`. Works over
//! child process stdio, Unix sockets, TCP, or `tokio::io::duplex` in tests.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::{Transport, TransportParts, TransportReceiver};
use crate::error::{Error, Result};

/// Largest frame accepted by default (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Bidirectional pipe transport before it is split into halves.
pub struct PipeTransport<W, R> {
	sender: PipeTransportSender<W>,
	receiver: PipeTransportReceiver<R>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates a transport writing to `writer` and reading from `reader`.
	///
	/// Returns the transport and the channel on which inbound messages arrive
	/// once [`run`](Self::run) (or the receiver half) is driven.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<String>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: PipeTransportSender {
				writer,
				max_frame_len: DEFAULT_MAX_FRAME_LEN,
			},
			receiver: PipeTransportReceiver {
				reader,
				message_tx,
				max_frame_len: DEFAULT_MAX_FRAME_LEN,
			},
		};
		(transport, message_rx)
	}

	/// Overrides the largest frame accepted in either direction.
	pub fn with_max_frame_len(mut self, max: usize) -> Self {
		self.sender.max_frame_len = max;
		self.receiver.max_frame_len = max;
		self
	}

	/// Sends one message.
	pub async fn send(&mut self, message: String) -> Result<()> {
		self.sender.send(message).await
	}

	/// Reads frames until the peer closes.
	pub async fn run(&mut self) -> Result<()> {
		self.receiver.run().await
	}

	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
		(self.sender, self.receiver)
	}

	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<String>) -> TransportParts {
		TransportParts::new(self.sender, self.receiver, message_rx)
	}
}

/// Writing half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
	writer: W,
	max_frame_len: usize,
}

#[async_trait]
impl<W> Transport for PipeTransportSender<W>
where
	W: AsyncWrite + Unpin + Send + 'static,
{
	async fn send(&mut self, message: String) -> Result<()> {
		let bytes = message.into_bytes();
		if bytes.len() > self.max_frame_len || u32::try_from(bytes.len()).is_err() {
			return Err(Error::FrameTooLarge {
				len: bytes.len(),
				max: self.max_frame_len,
			});
		}

		let length = bytes.len() as u32;
		self.writer
			.write_all(&length.to_le_bytes())
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write length prefix: {e}")))?;
		self.writer
			.write_all(&bytes)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write message: {e}")))?;
		self.writer.flush().await?;

		tracing::trace!(len = bytes.len(), "Wrote frame");
		Ok(())
	}
}

/// Reading half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
	reader: R,
	message_tx: mpsc::UnboundedSender<String>,
	max_frame_len: usize,
}

impl<R> PipeTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Reads the 4-byte prefix. `Ok(None)` means the stream ended cleanly between frames.
	async fn read_length(&mut self) -> Result<Option<usize>> {
		let mut prefix = [0u8; 4];
		let mut filled = 0;
		while filled < prefix.len() {
			let n = self
				.reader
				.read(&mut prefix[filled..])
				.await
				.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;
			if n == 0 {
				if filled == 0 {
					return Ok(None);
				}
				return Err(Error::TransportError(
					"Failed to read length prefix: stream ended mid-prefix".to_string(),
				));
			}
			filled += n;
		}
		Ok(Some(u32::from_le_bytes(prefix) as usize))
	}
}

#[async_trait]
impl<R> TransportReceiver for PipeTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	async fn run(&mut self) -> Result<()> {
		loop {
			let Some(length) = self.read_length().await? else {
				tracing::debug!("Pipe closed by peer");
				return Ok(());
			};

			if length > self.max_frame_len {
				return Err(Error::FrameTooLarge {
					len: length,
					max: self.max_frame_len,
				});
			}

			let mut buf = vec![0u8; length];
			self.reader
				.read_exact(&mut buf)
				.await
				.map_err(|e| Error::TransportError(format!("Failed to read message body: {e}")))?;

			let message = String::from_utf8(buf)
				.map_err(|e| Error::TransportError(format!("Frame is not valid UTF-8: {e}")))?;

			if self.message_tx.send(message).is_err() {
				tracing::debug!("Message consumer dropped, stopping pipe reader");
				return Ok(());
			}
		}
	}
}

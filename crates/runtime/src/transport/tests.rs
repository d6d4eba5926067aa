use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, text: &str) {
	writer.write_all(&(text.len() as u32).to_le_bytes()).await.unwrap();
	writer.write_all(text.as_bytes()).await.unwrap();
	writer.flush().await.unwrap();
}

#[test]
fn test_length_prefix_encoding() {
	let length: u32 = 1234;
	let bytes = length.to_le_bytes();

	assert_eq!(bytes[0], (length & 0xFF) as u8);
	assert_eq!(bytes[1], ((length >> 8) & 0xFF) as u8);
	assert_eq!(bytes[2], ((length >> 16) & 0xFF) as u8);
	assert_eq!(bytes[3], ((length >> 24) & 0xFF) as u8);
	assert_eq!(u32::from_le_bytes(bytes), length);
}

#[tokio::test]
async fn test_send_message() {
	// Transport writes into `stdin_write`; we read the frame back from `stdin_read`.
	let (mut stdin_read, stdin_write) = tokio::io::duplex(1024);
	let (stdout_read, _stdout_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(stdin_write, stdout_read);
	let (mut sender, _receiver) = transport.into_parts();

	let message = r#"{"protocol":"tether/1","type":"exposed_items_request","id":"1"}"#;
	sender.send(message.to_string()).await.unwrap();

	let mut len_buf = [0u8; 4];
	stdin_read.read_exact(&mut len_buf).await.unwrap();
	let length = u32::from_le_bytes(len_buf) as usize;
	assert_eq!(length, message.len());

	let mut msg_buf = vec![0u8; length];
	stdin_read.read_exact(&mut msg_buf).await.unwrap();
	assert_eq!(String::from_utf8(msg_buf).unwrap(), message);
}

#[tokio::test]
async fn test_multiple_messages_in_sequence() {
	let (_stdin_read, stdin_write) = tokio::io::duplex(4096);
	let (stdout_read, mut stdout_write) = tokio::io::duplex(4096);

	let (mut transport, mut rx) = PipeTransport::new(stdin_write, stdout_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let messages = ["first", "second", "third"].map(|m| format!(r#"{{"id":"{m}"}}"#));
	for message in &messages {
		write_frame(&mut stdout_write, message).await;
	}

	for expected in &messages {
		assert_eq!(&rx.recv().await.unwrap(), expected);
	}

	drop(stdout_write);
	let result = read_task.await.unwrap();
	assert!(result.is_ok(), "clean EOF between frames should not error: {result:?}");
}

#[tokio::test]
async fn test_large_message() {
	let (_stdin_read, stdin_write) = tokio::io::duplex(1024 * 1024);
	let (stdout_read, mut stdout_write) = tokio::io::duplex(1024 * 1024);

	let (mut transport, mut rx) = PipeTransport::new(stdin_write, stdout_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let large = serde_json::json!({ "id": "1", "data": "x".repeat(100_000) }).to_string();
	assert!(large.len() > 32_768);
	write_frame(&mut stdout_write, &large).await;

	assert_eq!(rx.recv().await.unwrap(), large);

	drop(stdout_write);
	drop(rx);
	let _ = read_task.await;
}

#[tokio::test]
async fn test_malformed_length_prefix() {
	let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
	let (stdout_read, mut stdout_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = PipeTransport::new(stdin_write, stdout_read);

	// Two bytes of a four byte prefix, then EOF.
	stdout_write.write_all(&[0x01, 0x02]).await.unwrap();
	stdout_write.flush().await.unwrap();
	drop(stdout_write);

	let result = transport.run().await;
	assert!(result.is_err());
	assert!(
		result
			.unwrap_err()
			.to_string()
			.contains("Failed to read length prefix")
	);
}

#[tokio::test]
async fn test_truncated_body() {
	let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
	let (stdout_read, mut stdout_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = PipeTransport::new(stdin_write, stdout_read);

	stdout_write.write_all(&10u32.to_le_bytes()).await.unwrap();
	stdout_write.write_all(b"abc").await.unwrap();
	drop(stdout_write);

	let err = transport.run().await.unwrap_err();
	assert!(err.to_string().contains("Failed to read message body"));
}

#[tokio::test]
async fn test_frame_limit() {
	let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
	let (stdout_read, mut stdout_write) = tokio::io::duplex(1024);

	let (transport, _rx) = PipeTransport::new(stdin_write, stdout_read);
	let mut transport = transport.with_max_frame_len(8);

	let err = transport.send("0123456789".to_string()).await.unwrap_err();
	assert!(matches!(err, crate::Error::FrameTooLarge { len: 10, max: 8 }));

	stdout_write.write_all(&100u32.to_le_bytes()).await.unwrap();
	let err = transport.run().await.unwrap_err();
	assert!(matches!(err, crate::Error::FrameTooLarge { len: 100, max: 8 }));
}

#[tokio::test]
async fn test_graceful_shutdown() {
	let (_stdin_read, stdin_write) = tokio::io::duplex(1024);
	let (stdout_read, mut stdout_write) = tokio::io::duplex(1024);

	let (mut transport, mut rx) = PipeTransport::new(stdin_write, stdout_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	write_frame(&mut stdout_write, r#"{"id":"1"}"#).await;
	assert_eq!(rx.recv().await.unwrap(), r#"{"id":"1"}"#);

	// Consumer goes away first, then the peer closes.
	drop(rx);
	drop(stdout_write);

	let result = read_task.await.unwrap();
	assert!(result.is_ok());
}

#[tokio::test]
async fn test_memory_pair_delivers_both_ways() {
	let (mut a, mut b) = memory::pair();

	let mut a_receiver = a.receiver;
	let mut b_receiver = b.receiver;
	tokio::spawn(async move { a_receiver.run().await });
	tokio::spawn(async move { b_receiver.run().await });

	a.sender.send("ping".to_string()).await.unwrap();
	b.sender.send("pong".to_string()).await.unwrap();

	assert_eq!(b.message_rx.recv().await.unwrap(), "ping");
	assert_eq!(a.message_rx.recv().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_memory_pair_reports_closed_peer() {
	let (mut a, b) = memory::pair();
	drop(b);

	let err = a.sender.send("lost".to_string()).await.unwrap_err();
	assert!(matches!(err, crate::Error::ChannelClosed));
}

#[tokio::test]
async fn test_bus_fans_out_except_publisher() {
	let bus = MessageBus::new();
	let mut first = bus.endpoint();
	let mut second = bus.endpoint();
	let mut third = bus.endpoint();

	for receiver in [first.receiver, second.receiver, third.receiver] {
		let mut receiver = receiver;
		tokio::spawn(async move { receiver.run().await });
	}

	first.sender.send("hello".to_string()).await.unwrap();
	bus.publish("foreign");

	assert_eq!(second.message_rx.recv().await.unwrap(), "hello");
	assert_eq!(third.message_rx.recv().await.unwrap(), "hello");
	assert_eq!(second.message_rx.recv().await.unwrap(), "foreign");
	assert_eq!(third.message_rx.recv().await.unwrap(), "foreign");

	// The publisher only sees the external message, never its own.
	assert_eq!(first.message_rx.recv().await.unwrap(), "foreign");
}

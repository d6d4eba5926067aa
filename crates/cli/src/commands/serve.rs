use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tether::transport::{PipeTransport, websocket};
use tether::{Bridge, Identity, InterfaceDescriptor, Registry};
use tokio::net::{TcpListener, TcpStream};

use crate::demo;
use crate::error::Result;

pub async fn execute(listen: SocketAddr, stdio: bool) -> Result<()> {
	let registry = Arc::new(Registry::new());
	let exposed = demo::expose_all(&registry);
	let descriptor = demo::descriptor();

	if stdio {
		serve_stdio(registry, &descriptor, &exposed).await
	} else {
		serve_websocket(listen, registry, descriptor, &exposed).await
	}
}

/// One bridge over this process's stdin/stdout. Returns when stdin closes.
async fn serve_stdio(
	registry: Arc<Registry>,
	descriptor: &InterfaceDescriptor,
	exposed: &[(&'static str, Identity)],
) -> Result<()> {
	// stdout carries frames; anything for humans goes to stderr.
	for (name, id) in exposed {
		eprintln!("{} {name} = {id}", "exposed".green().bold());
	}

	let (transport, message_rx) = PipeTransport::new(tokio::io::stdout(), tokio::io::stdin());
	let bridge = Bridge::builder(transport.into_transport_parts(message_rx))
		.registry(registry)
		.descriptor(descriptor)
		.build();
	bridge.run().await?;
	Ok(())
}

/// Accepts WebSocket peers until interrupted; every peer gets its own bridge
/// over the same registry.
async fn serve_websocket(
	listen: SocketAddr,
	registry: Arc<Registry>,
	descriptor: InterfaceDescriptor,
	exposed: &[(&'static str, Identity)],
) -> Result<()> {
	let listener = TcpListener::bind(listen)
		.await
		.with_context(|| format!("could not listen on {listen}"))?;
	let local = listener.local_addr()?;

	println!("{} ws://{local}", "listening".green().bold());
	for (name, id) in exposed {
		println!("{} {name} = {id}", "exposed".green().bold());
	}

	let descriptor = Arc::new(descriptor);
	loop {
		tokio::select! {
			accepted = listener.accept() => {
				let (stream, peer) = match accepted {
					Ok(accepted) => accepted,
					Err(e) => {
						tracing::warn!("Accept failed: {}", e);
						continue;
					}
				};
				tokio::spawn(serve_peer(stream, peer, Arc::clone(&registry), Arc::clone(&descriptor)));
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Interrupted; shutting down");
				return Ok(());
			}
		}
	}
}

async fn serve_peer(
	stream: TcpStream,
	peer: SocketAddr,
	registry: Arc<Registry>,
	descriptor: Arc<InterfaceDescriptor>,
) {
	let parts = match websocket::accept(stream).await {
		Ok(parts) => parts,
		Err(e) => {
			tracing::warn!(%peer, "WebSocket handshake failed: {}", e);
			return;
		}
	};

	tracing::info!(%peer, "Peer connected");
	let bridge = Bridge::builder(parts)
		.registry(registry)
		.descriptor(&descriptor)
		.build();
	if let Err(e) = bridge.run().await {
		tracing::warn!(%peer, "Bridge stopped: {}", e);
	}
	tracing::info!(%peer, "Peer disconnected");
}

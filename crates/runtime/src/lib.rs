//! tether runtime - transports, client connection, and remote proxies
//!
//! This crate provides the plumbing shared by both ends of a bridge:
//!
//! - **Transport**: string channels over pipes, in-process buses, or WebSockets
//! - **Connection**: client-side request/response correlation
//! - **RemoteItem**: path-addressed proxy for values exposed by a host
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐                      ┌─────────────┐
//! │   tether    │  Bridge (host)       │ RemoteItem  │
//! └──────┬──────┘                      └──────┬──────┘
//!        │                                    │
//!        │ TransportParts              ┌──────▼──────┐
//!        │                             │ Connection  │
//!        │                             └──────┬──────┘
//! ┌──────▼────────────────────────────────────▼──────┐
//! │  Transport: pipe / memory / bus / websocket      │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The host-side dispatcher lives in the `tether` crate; it consumes the
//! same [`TransportParts`] as [`Connection`].

pub mod connection;
pub mod error;
pub mod remote;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use remote::RemoteItem;
pub use transport::{
	MessageBus, OutboundWriter, PipeTransport, PipeTransportReceiver, PipeTransportSender, Transport, TransportParts,
	TransportReceiver, WebSocketTransportReceiver, WebSocketTransportSender, memory, websocket,
};

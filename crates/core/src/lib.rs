//! tether - expose host objects to a remote peer
//!
//! A [`Bridge`] sits on one end of a string channel and answers four
//! requests from the other end: describe the interface, list exposed items,
//! read a property, and call a method. The peer drives it through a
//! [`Connection`] and [`RemoteItem`] proxies.
//!
//! # Example
//!
//! ```ignore
//! use tether::{Bridge, Connection, Record, parse_args, transport::memory};
//! use serde_json::json;
//!
//! let (host, client) = memory::pair();
//! let bridge = Arc::new(Bridge::new(host));
//! let id = bridge.expose(Record::new().method("greet", |_, args| {
//!     let (who,): (String,) = parse_args(args)?;
//!     Ok(json!(format!("hi {who}")))
//! }));
//! tokio::spawn({ let bridge = Arc::clone(&bridge); async move { bridge.run().await } });
//!
//! let connection = Arc::new(Connection::new(client));
//! tokio::spawn({ let c = Arc::clone(&connection); async move { c.run().await } });
//! let greeting: String = connection.item(&*id).call("greet", vec![json!("Ann")]).await?;
//! ```

pub mod bridge;
pub mod dispatch;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod value;

pub use bridge::{Bridge, BridgeBuilder};
pub use dispatch::{Dispatcher, Reply};
pub use record::Record;
pub use registry::{Identity, IdentitySource, MAX_IDENTITY_ATTEMPTS, Registry, UuidIdentities};
pub use resolve::resolve;
pub use tether_protocol::{
	CallOutcome, Envelope, Fault, InterfaceDescriptor, MethodCall, Operation, PROTOCOL, PropertyRef,
	Request, Response, TypeDescriptor,
};
pub use tether_runtime::{Connection, Error, RemoteItem, Result, transport};
pub use value::{Exposed, Invocation, Kind, Method, Value, parse_args};

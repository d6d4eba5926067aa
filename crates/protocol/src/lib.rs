//! Wire types for the tether remote-object protocol.
//!
//! This crate is shared by both ends of a bridge:
//!
//! - [`Envelope`] - tagged JSON message with discriminator and correlation token
//! - [`Request`] / [`Response`] - decoded bodies of the four operations
//! - [`CallOutcome`] / [`Fault`] - result or error of a remote method call
//! - [`InterfaceDescriptor`] - optional description of the exposed interface
//!
//! It performs no I/O; transports and dispatch live in `tether-runtime` and
//! `tether`.

pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod fault;

pub use descriptor::{InterfaceDescriptor, TypeDescriptor};
pub use envelope::{
	CallOutcome, Direction, Envelope, MethodCall, Operation, PROTOCOL, PropertyRef, Request,
	Response,
};
pub use error::DecodeError;
pub use fault::{BAD_ITEM_PATH, ErrorPayload, Fault, NOT_A_FUNCTION};

//! `tether` command-line host and client.

pub mod cli;
pub mod commands;
pub mod demo;
pub mod error;
pub mod logging;
pub mod output;
pub mod path;
pub mod styles;

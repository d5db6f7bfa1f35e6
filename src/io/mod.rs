//! # I/O abstractions
//!
//! Connection identities and per-connection state, transport endpoint
//! configuration, and the transport workers that feed the router loop.

mod connection;
mod endpoint;
pub(crate) mod transport;

pub use connection::{ConnectionInfo, ConnectionKey};
pub use endpoint::Endpoint;

pub(crate) use connection::Connection;

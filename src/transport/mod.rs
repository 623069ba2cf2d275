//! Transport implementations.
//!
//! This module provides the three concrete implementations of the
//! domain-level `Transport` trait. None of them holds a connection between
//! calls, and none speaks a wire protocol directly: they drive the broker
//! collaborators they were built with.
//!
//! Domain code must not depend on transport-specific types beyond their
//! constructors.

mod bus;
mod connection_string;
mod legacy;
mod workload_identity;

pub use connection_string::ConnectionStringTransport;
pub use legacy::{Handshake, HandshakeState, LegacyCredentialTransport};
pub use workload_identity::WorkloadIdentityTransport;

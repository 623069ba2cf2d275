// src/transport/legacy/mod.rs

//! Legacy broker transport.
//!
//! Publishes to an AMQP broker with static username/password credentials.
//! Unlike the message-bus transports, the underlying client is event driven:
//! a sender link is opened first and may only transmit once the connection
//! reports it sendable. That handshake is modelled explicitly in
//! [`handshake`] so that it composes with the same cancellation and
//! deadline handling as the other transports.

mod handshake;
mod transport;

pub use handshake::{Handshake, HandshakeState};
pub use transport::LegacyCredentialTransport;

// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the domain-level publish interface used by the
//! [`Publisher`](crate::Publisher). It intentionally avoids any reference to
//! concrete brokers or client libraries; those are reached through the
//! collaborator traits in [`broker`](super::broker).
//!
//! A transport owns no connection between calls. Each `publish()` acquires
//! its client (or connection), sends exactly one message to exactly one
//! queue, and releases everything it acquired before returning.
//!
//! Concrete implementations live under `src/transport/`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Deadline, Message};
use crate::Result;

/// The three send strategies, in selection precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Cloud message bus reached with a connection string.
    ConnectionString,

    /// Cloud message bus reached with an ambient workload-identity credential.
    WorkloadIdentity,

    /// Legacy AMQP broker reached with a username and password.
    LegacyCredential,
}

impl TransportKind {
    /// Human-readable description of how the transport authenticates.
    pub fn describe(&self) -> &'static str {
        match self {
            TransportKind::ConnectionString => "message bus connection string",
            TransportKind::WorkloadIdentity => "workload identity credentials",
            TransportKind::LegacyCredential => "local auth credentials",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::ConnectionString => "connection-string",
            TransportKind::WorkloadIdentity => "workload-identity",
            TransportKind::LegacyCredential => "legacy-credential",
        };
        f.write_str(name)
    }
}

/// Transport abstraction.
///
/// Implementations must ensure that:
/// - every client, sender or connection acquired during `publish()` is closed
///   exactly once before `publish()` returns, whatever the outcome;
/// - every broker step is raced against `deadline`, while release steps are
///   not;
/// - no state survives between calls.
///
/// # Notes
///
/// This trait uses `async_trait`; the expanded documentation may show explicit
/// lifetimes and a boxed `Future`. Consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Which strategy this transport implements.
    fn kind(&self) -> TransportKind;

    /// Send `message` to `queue`.
    async fn publish(&self, queue: &str, message: Message, deadline: &Deadline) -> Result<()>;
}

/// Shared transport pointer.
///
/// Used to erase concrete transport types behind a stable domain interface.
pub type TransportPtr = Arc<dyn Transport>;

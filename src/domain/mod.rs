//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! concrete broker clients or infrastructure concerns.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod broker;
mod deadline;
mod message;
mod outcome;
mod transport;

// --- Transport domain re-exports ---

pub use deadline::Deadline;
pub use message::Message;
pub use outcome::{Delivery, PublishOutcome, PublishResult, SkipReason};
pub use transport::{Transport, TransportKind, TransportPtr};

// --- Broker collaborator re-exports ---

pub use broker::{
    //
    AmqpConnectOptions,
    AmqpConnection,
    AmqpConnector,
    AmqpSender,
    BusClient,
    BusClientFactory,
    BusMessage,
    BusSender,
    CredentialProvider,
    CredentialPtr,
    LinkEvent,
    PendingLink,
    TokenCredential,
};

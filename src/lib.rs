//! One-shot message publishing over pluggable broker transports
//!
//! This library lets a web service hand off an order message without knowing
//! which broker it runs against. On every call it reads the configuration,
//! picks one of three transports by a fixed precedence, sends the message,
//! and releases every connection it opened.
//!
//! - connection-string message bus
//! - message bus authenticated by an ambient workload identity
//! - legacy AMQP broker with username/password
//!
//! When nothing is configured the publish is skipped and reported as such.
//!

// Import all sub modules once...
mod macros;

pub mod broker;
mod domain;
mod error;
mod publisher;
mod publisher_builder;
pub mod selector;
pub mod transport;
pub mod transport_config;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use publisher::{ConfigSource, Publisher};
pub use publisher_builder::PublisherBuilder;

pub use selector::{select, Resolution, Selection, TransportSelector};
pub use transport_config::{EnvSource, ProcessEnv, TransportConfig, DEFAULT_QUEUE_NAME};

pub use error::{BrokerError, BrokerResult, PublishError, Result};

// --- public re-exports
pub use domain::{
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
    Deadline,
    Delivery,
    LinkEvent,
    Message,
    PendingLink,
    PublishOutcome,
    PublishResult,
    SkipReason,
    TokenCredential,
    Transport,
    TransportKind,
    TransportPtr,
};

/// Publish `message` using the process environment and the given bus
/// collaborators.
///
/// Convenience for hosts that do not keep a [`Publisher`] around; the AMQP
/// connector is the crate default.
pub async fn send_message(
    message: impl Into<Message>,
    bus: std::sync::Arc<dyn BusClientFactory>,
    credentials: std::sync::Arc<dyn CredentialProvider>,
) -> PublishResult {
    // ---
    PublisherBuilder::new()
        .bus(bus)
        .credentials(credentials)
        .build()
        .send_message(message)
        .await
}

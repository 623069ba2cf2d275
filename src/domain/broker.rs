// src/domain/broker.rs

//! Broker collaborator interfaces.
//!
//! The transports never speak a wire protocol themselves. They drive external
//! broker clients through the traits in this module, which keeps selection,
//! lifecycle and error mapping testable against the in-memory reference
//! broker in [`crate::broker::memory`].
//!
//! Two client families are modelled:
//!
//! - **Message bus** ([`BusClientFactory`] → [`BusClient`] → [`BusSender`]):
//!   request/response style; every call completes or fails on its own.
//! - **Legacy AMQP** ([`AmqpConnector`] → [`AmqpConnection`] → [`AmqpSender`]):
//!   event driven; a freshly opened sender may not transmit until the
//!   connection reports [`LinkEvent::Sendable`].

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::BrokerResult;

//
// Message bus
//

/// A message as handed to a bus sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub body: String,
}

/// Opens bus clients.
#[async_trait::async_trait]
pub trait BusClientFactory: Send + Sync {
    // ---
    /// Open a client authenticated by a connection string.
    async fn from_connection_string(&self, connection_string: &str)
        -> BrokerResult<Box<dyn BusClient>>;

    /// Open a client against a fully qualified namespace with a token credential.
    async fn from_credential(
        &self,
        namespace: &str,
        credential: CredentialPtr,
    ) -> BrokerResult<Box<dyn BusClient>>;
}

/// An open bus client. Must be closed by its owner.
#[async_trait::async_trait]
pub trait BusClient: Send + Sync {
    async fn create_sender(&self, queue: &str) -> BrokerResult<Box<dyn BusSender>>;

    async fn close(&self) -> BrokerResult<()>;
}

/// A sender bound to one queue. Must be closed by its owner.
#[async_trait::async_trait]
pub trait BusSender: Send + Sync {
    async fn send(&self, message: BusMessage) -> BrokerResult<()>;

    async fn close(&self) -> BrokerResult<()>;
}

//
// Credentials
//

/// A credential able to mint access tokens for the bus.
///
/// The bus client calls this; transports only pass it along.
#[async_trait::async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short label of where the credential came from, for logs.
    fn source(&self) -> &str;

    async fn get_token(&self, scope: &str) -> BrokerResult<String>;
}

pub type CredentialPtr = Arc<dyn TokenCredential>;

/// Resolves the ambient default credential (workload identity, managed
/// identity, developer login, ...). The resolution chain belongs to the
/// implementation.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn default_credential(&self) -> BrokerResult<CredentialPtr>;
}

//
// Legacy AMQP
//

/// Connection parameters for the legacy broker.
#[derive(Clone, PartialEq, Eq)]
pub struct AmqpConnectOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Socket transport override such as `"tls"` or `"tcp"`.
    pub transport: Option<String>,
    /// Reconnect attempts after the first connect fails.
    pub reconnect_limit: u32,
}

impl AmqpConnectOptions {
    /// Whether the transport override asks for an encrypted socket.
    pub fn is_tls(&self) -> bool {
        matches!(
            self.transport.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("tls") | Some("ssl")
        )
    }
}

impl fmt::Debug for AmqpConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("transport", &self.transport)
            .field("reconnect_limit", &self.reconnect_limit)
            .finish()
    }
}

/// Events a legacy connection reports for a pending sender link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The connection finished opening.
    ConnectionOpened,

    /// The sender link has credit and may transmit.
    Sendable,

    /// The broker refused the link or the connection failed.
    Error(String),

    /// The connection was closed by the peer.
    Disconnected,
}

/// A sender link that is open but not necessarily sendable yet.
pub struct PendingLink {
    pub sender: Box<dyn AmqpSender>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Opens legacy broker connections.
#[async_trait::async_trait]
pub trait AmqpConnector: Send + Sync {
    async fn connect(&self, options: &AmqpConnectOptions) -> BrokerResult<Box<dyn AmqpConnection>>;
}

/// An open legacy connection. Must be closed by its owner.
#[async_trait::async_trait]
pub trait AmqpConnection: Send {
    /// Open a sender link to `address`. Link progress arrives on
    /// [`PendingLink::events`].
    async fn open_sender(&mut self, address: &str) -> BrokerResult<PendingLink>;

    async fn close(&mut self) -> BrokerResult<()>;
}

/// A legacy sender link. Must be closed by its owner.
#[async_trait::async_trait]
pub trait AmqpSender: Send {
    /// Transmit one message whose body is a single binary data section.
    async fn send(&mut self, data: Bytes) -> BrokerResult<()>;

    async fn close(&mut self) -> BrokerResult<()>;
}

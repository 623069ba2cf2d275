//! Broker collaborator implementations.
//!
//! - [`memory`]: in-process reference broker implementing every
//!   collaborator trait, with call recording and failure injection.
//! - `lapin`: real legacy AMQP connector (feature `transport_lapin`).
//! - [`Unconfigured`]: null object for collaborators the host did not
//!   supply. Selecting a transport whose collaborator is unconfigured is a
//!   setup failure at publish time, never a selection change.

use std::sync::Arc;

use crate::{
    //
    AmqpConnectOptions,
    AmqpConnection,
    AmqpConnector,
    BrokerResult,
    BusClient,
    BusClientFactory,
    CredentialProvider,
    CredentialPtr,
};

pub mod memory;

#[cfg(feature = "transport_lapin")]
mod lapin;

#[cfg(feature = "transport_lapin")]
pub use lapin::LapinConnector;

/// Collaborator placeholder that fails every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait::async_trait]
impl BusClientFactory for Unconfigured {
    async fn from_connection_string(&self, _: &str) -> BrokerResult<Box<dyn BusClient>> {
        Err("no message bus client configured".into())
    }

    async fn from_credential(&self, _: &str, _: CredentialPtr) -> BrokerResult<Box<dyn BusClient>> {
        Err("no message bus client configured".into())
    }
}

#[async_trait::async_trait]
impl CredentialProvider for Unconfigured {
    async fn default_credential(&self) -> BrokerResult<CredentialPtr> {
        Err("no credential provider configured".into())
    }
}

#[async_trait::async_trait]
impl AmqpConnector for Unconfigured {
    async fn connect(&self, _: &AmqpConnectOptions) -> BrokerResult<Box<dyn AmqpConnection>> {
        Err("transport_lapin feature is not enabled and no AMQP connector was configured".into())
    }
}

/// Connector used when the host supplies none: lapin when the
/// `transport_lapin` feature is enabled, otherwise [`Unconfigured`].
pub fn default_amqp_connector() -> Arc<dyn AmqpConnector> {
    // ---
    #[cfg(feature = "transport_lapin")]
    {
        Arc::new(LapinConnector::new())
    }

    #[cfg(not(feature = "transport_lapin"))]
    {
        Arc::new(Unconfigured)
    }
}

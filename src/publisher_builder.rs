//! Publisher builder.
//!
//! Provides a fluent builder API for wiring a [`Publisher`] to its broker
//! collaborators, its configuration source and an optional per-call timeout.

use std::sync::Arc;
use std::time::Duration;

use crate::broker::{default_amqp_connector, Unconfigured};
use crate::publisher::ConfigSource;
use crate::{
    //
    AmqpConnector,
    BusClientFactory,
    CredentialProvider,
    EnvSource,
    ProcessEnv,
    Publisher,
    TransportConfig,
    TransportSelector,
};

/// Builder for creating publishers.
///
/// Every setting is optional:
///
/// - collaborators default to null objects (`Unconfigured`), except the
///   AMQP connector, which is lapin-backed when the `transport_lapin`
///   feature is enabled. A transport whose collaborator is missing fails at
///   publish time with a setup error; selection itself never changes.
/// - configuration defaults to the process environment, re-read per call.
/// - there is no timeout unless one is set.
///
/// # Examples
///
/// ## Environment-driven publisher
/// ```no_run
/// use mom_publish::PublisherBuilder;
/// # use std::sync::Arc;
/// # fn example(bus: Arc<dyn mom_publish::BusClientFactory>) {
/// let publisher = PublisherBuilder::new()
///     .bus(bus)
///     .timeout(std::time::Duration::from_secs(10))
///     .build();
/// # }
/// ```
///
/// ## Injected configuration
/// ```
/// use mom_publish::{PublisherBuilder, TransportConfig};
///
/// let publisher = PublisherBuilder::new()
///     .config(TransportConfig::default().with_legacy_credentials("user", "pass"))
///     .build();
/// assert!(publisher.config().has_legacy_credentials());
/// ```
#[derive(Default)]
pub struct PublisherBuilder {
    // ---
    bus: Option<Arc<dyn BusClientFactory>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    amqp: Option<Arc<dyn AmqpConnector>>,
    selector: Option<TransportSelector>,
    config: Option<ConfigSource>,
    timeout: Option<Duration>,
}

impl PublisherBuilder {
    /// Create a new publisher builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Message-bus client factory for the connection-string and
    /// workload-identity transports.
    pub fn bus(mut self, bus: Arc<dyn BusClientFactory>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Default-credential provider for the workload-identity transport.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Connector for the legacy-credential transport.
    pub fn amqp_connector(mut self, connector: Arc<dyn AmqpConnector>) -> Self {
        self.amqp = Some(connector);
        self
    }

    /// Use a fully wired selector. Overrides `bus`, `credentials` and
    /// `amqp_connector`.
    pub fn selector(mut self, selector: TransportSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Inject a fixed configuration instead of reading the environment.
    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = Some(ConfigSource::Fixed(config));
        self
    }

    /// Read configuration from `source` on every call.
    pub fn env_source(mut self, source: Arc<dyn EnvSource + Send + Sync>) -> Self {
        self.config = Some(ConfigSource::Environment(source));
        self
    }

    /// Bound each publish call. The scoped client or connection is still
    /// closed when the timeout fires.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the publisher (consumes self).
    pub fn build(self) -> Publisher {
        // ---
        let selector = self.selector.unwrap_or_else(|| {
            TransportSelector::new(
                self.bus.unwrap_or_else(|| Arc::new(Unconfigured)),
                self.credentials.unwrap_or_else(|| Arc::new(Unconfigured)),
                self.amqp.unwrap_or_else(default_amqp_connector),
            )
        });

        let config = self
            .config
            .unwrap_or_else(|| ConfigSource::Environment(Arc::new(ProcessEnv)));

        Publisher::new(selector, config, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::broker::memory::MemoryBroker;
    use crate::{PublishError, TransportKind};

    #[tokio::test]
    async fn missing_collaborator_fails_at_publish_time() {
        // ---
        let publisher = PublisherBuilder::new()
            .config(TransportConfig::default().with_connection_string("cs1"))
            .build();

        let err = publisher
            .send_message("hello")
            .await
            .expect_err("no bus client configured");

        assert!(matches!(
            err,
            PublishError::Setup {
                transport: TransportKind::ConnectionString,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn individual_collaborators_are_wired() {
        // ---
        let broker = MemoryBroker::new();
        let publisher = PublisherBuilder::new()
            .bus(broker.bus())
            .credentials(broker.credentials())
            .config(TransportConfig::default().with_workload_identity(Some("ns".into())))
            .timeout(Duration::from_secs(5))
            .build();

        let outcome = publisher.send_message("hello").await.expect("publish");

        assert!(outcome.is_delivered());
        assert_eq!(publisher.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(broker.last_namespace().as_deref(), Some("ns"));
    }

    #[tokio::test]
    async fn maximal_timeout_publishes_normally() {
        // ---
        let broker = MemoryBroker::new();
        let publisher = PublisherBuilder::new()
            .selector(broker.selector())
            .config(TransportConfig::default().with_connection_string("cs1"))
            .timeout(Duration::MAX)
            .build();

        let outcome = publisher.send_message("hello").await.expect("publish");

        assert!(outcome.is_delivered());
        assert_eq!(broker.bus_messages("orders").len(), 1);
    }

    #[test]
    fn last_config_source_wins() {
        // ---
        let publisher = PublisherBuilder::new()
            .env_source(Arc::new(std::collections::HashMap::<String, String>::new()))
            .config(TransportConfig::default().with_connection_string("cs1"))
            .build();

        assert_eq!(publisher.config().connection_string.as_deref(), Some("cs1"));
    }
}

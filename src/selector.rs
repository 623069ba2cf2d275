//! Transport selection policy.
//!
//! Selection is a fixed precedence table evaluated top to bottom; the first
//! rule whose condition holds decides the outcome, even when a later rule
//! would also be satisfied:
//!
//! | # | condition                         | outcome                          |
//! |---|-----------------------------------|----------------------------------|
//! | 1 | connection string present         | connection-string transport      |
//! | 2 | workload identity enabled         | workload-identity transport, or  |
//! |   |   ... but no namespace host       | skipped (no hostname set)        |
//! | 3 | legacy username and password      | legacy-credential transport      |
//! | 4 | otherwise                         | skipped (no credentials)         |
//!
//! Rule 2 short-circuits: a missing host is a skip, never a fall-through to
//! rule 3.
//!
//! [`select`] is pure and works on a [`TransportConfig`] alone.
//! [`TransportSelector`] adds the broker collaborators and turns a
//! [`Selection`] into a ready [`TransportPtr`].

use std::sync::Arc;

use crate::transport::{
    //
    ConnectionStringTransport,
    LegacyCredentialTransport,
    WorkloadIdentityTransport,
};
use crate::{
    //
    AmqpConnectOptions,
    AmqpConnector,
    BusClientFactory,
    CredentialProvider,
    SkipReason,
    TransportConfig,
    TransportKind,
    TransportPtr,
};

/// Host used by the legacy transport when none is configured.
pub const DEFAULT_LEGACY_HOST: &str = "localhost";

/// AMQP port used by the legacy transport when none is configured.
pub const DEFAULT_AMQP_PORT: u16 = 5672;

/// AMQP-over-TLS port used when the transport override asks for TLS.
pub const DEFAULT_AMQPS_PORT: u16 = 5671;

/// Parameters for the connection-string transport.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionStringParams {
    pub connection_string: String,
    pub queue: String,
}

impl std::fmt::Debug for ConnectionStringParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStringParams")
            .field("connection_string", &"<redacted>")
            .field("queue", &self.queue)
            .finish()
    }
}

/// Parameters for the workload-identity transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentityParams {
    pub namespace_host: String,
    pub queue: String,
}

/// Parameters for the legacy-credential transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCredentialParams {
    pub options: AmqpConnectOptions,
    pub queue: String,
}

/// The one transport (or skip) chosen for a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    ConnectionString(ConnectionStringParams),
    WorkloadIdentity(WorkloadIdentityParams),
    LegacyCredential(LegacyCredentialParams),
    Skipped(SkipReason),
}

impl Selection {
    /// Selected transport kind, `None` when skipped.
    pub fn kind(&self) -> Option<TransportKind> {
        match self {
            Selection::ConnectionString(_) => Some(TransportKind::ConnectionString),
            Selection::WorkloadIdentity(_) => Some(TransportKind::WorkloadIdentity),
            Selection::LegacyCredential(_) => Some(TransportKind::LegacyCredential),
            Selection::Skipped(_) => None,
        }
    }

    /// Destination queue, `None` when skipped.
    pub fn queue(&self) -> Option<&str> {
        match self {
            Selection::ConnectionString(p) => Some(&p.queue),
            Selection::WorkloadIdentity(p) => Some(&p.queue),
            Selection::LegacyCredential(p) => Some(&p.queue),
            Selection::Skipped(_) => None,
        }
    }
}

/// Apply the precedence table to `cfg`.
///
/// Empty string values count as absent, however the config was built.
pub fn select(cfg: &TransportConfig) -> Selection {
    // ---
    let cfg = &cfg.normalized();

    if let Some(connection_string) = &cfg.connection_string {
        return Selection::ConnectionString(ConnectionStringParams {
            connection_string: connection_string.clone(),
            queue: cfg.connection_string_queue().to_string(),
        });
    }

    if cfg.use_workload_identity {
        return match &cfg.namespace_host {
            Some(host) => Selection::WorkloadIdentity(WorkloadIdentityParams {
                namespace_host: host.clone(),
                queue: cfg.order_queue().to_string(),
            }),
            None => Selection::Skipped(SkipReason::NoHostname),
        };
    }

    if let (Some(username), Some(password)) = (&cfg.legacy_username, &cfg.legacy_password) {
        let mut options = AmqpConnectOptions {
            host: cfg
                .legacy_host
                .clone()
                .unwrap_or_else(|| DEFAULT_LEGACY_HOST.to_string()),
            port: DEFAULT_AMQP_PORT,
            username: username.clone(),
            password: password.clone(),
            transport: cfg.legacy_transport.clone(),
            reconnect_limit: cfg.reconnect_limit,
        };
        options.port = match cfg.legacy_port {
            Some(port) => port,
            None if options.is_tls() => DEFAULT_AMQPS_PORT,
            None => DEFAULT_AMQP_PORT,
        };

        return Selection::LegacyCredential(LegacyCredentialParams {
            options,
            queue: cfg.order_queue().to_string(),
        });
    }

    Selection::Skipped(SkipReason::NoCredentials)
}

/// A transport ready to publish, or the reason there is none.
pub enum Resolution {
    Transport {
        transport: TransportPtr,
        queue: String,
    },
    Skipped(SkipReason),
}

/// Builds the selected transport from the configured collaborators.
#[derive(Clone)]
pub struct TransportSelector {
    // ---
    bus: Arc<dyn BusClientFactory>,
    credentials: Arc<dyn CredentialProvider>,
    amqp: Arc<dyn AmqpConnector>,
}

impl TransportSelector {
    // ---
    pub fn new(
        bus: Arc<dyn BusClientFactory>,
        credentials: Arc<dyn CredentialProvider>,
        amqp: Arc<dyn AmqpConnector>,
    ) -> Self {
        Self {
            bus,
            credentials,
            amqp,
        }
    }

    /// Select for `cfg` and instantiate the winner.
    ///
    /// Instantiation only wires collaborators together; no client is opened
    /// until the transport publishes.
    pub fn resolve(&self, cfg: &TransportConfig) -> Resolution {
        // ---
        match select(cfg) {
            Selection::ConnectionString(p) => Resolution::Transport {
                transport: Arc::new(ConnectionStringTransport::new(
                    p.connection_string,
                    Arc::clone(&self.bus),
                )),
                queue: p.queue,
            },
            Selection::WorkloadIdentity(p) => Resolution::Transport {
                transport: Arc::new(WorkloadIdentityTransport::new(
                    p.namespace_host,
                    Arc::clone(&self.bus),
                    Arc::clone(&self.credentials),
                )),
                queue: p.queue,
            },
            Selection::LegacyCredential(p) => Resolution::Transport {
                transport: Arc::new(LegacyCredentialTransport::new(
                    p.options,
                    Arc::clone(&self.amqp),
                )),
                queue: p.queue,
            },
            Selection::Skipped(reason) => Resolution::Skipped(reason),
        }
    }
}

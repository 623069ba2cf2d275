//! Transport configuration snapshot.
//!
//! A [`TransportConfig`] records which transport parameters are present. It
//! performs no validation: absent values stay `None` and the
//! [`selector`](crate::select) decides what they mean. Values are read from
//! an [`EnvSource`], normally the process environment, at the moment
//! [`TransportConfig::load`] is called, so reconfiguration between publish
//! calls is honored.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::log_warn;

/// Environment variable names.
pub mod vars {
    pub const SERVICEBUS_CONNECTION_STRING: &str = "SERVICEBUS_CONNECTION_STRING";
    pub const SERVICEBUS_QUEUE_NAME: &str = "SERVICEBUS_QUEUE_NAME";
    pub const ORDER_QUEUE_NAME: &str = "ORDER_QUEUE_NAME";
    pub const USE_WORKLOAD_IDENTITY_AUTH: &str = "USE_WORKLOAD_IDENTITY_AUTH";
    pub const ORDER_QUEUE_HOSTNAME: &str = "ORDER_QUEUE_HOSTNAME";
    pub const AZURE_SERVICEBUS_FULLYQUALIFIEDNAMESPACE: &str =
        "AZURE_SERVICEBUS_FULLYQUALIFIEDNAMESPACE";
    pub const ORDER_QUEUE_USERNAME: &str = "ORDER_QUEUE_USERNAME";
    pub const ORDER_QUEUE_PASSWORD: &str = "ORDER_QUEUE_PASSWORD";
    pub const ORDER_QUEUE_PORT: &str = "ORDER_QUEUE_PORT";
    pub const ORDER_QUEUE_TRANSPORT: &str = "ORDER_QUEUE_TRANSPORT";
    pub const ORDER_QUEUE_RECONNECT_LIMIT: &str = "ORDER_QUEUE_RECONNECT_LIMIT";
}

/// Queue used when no queue name is configured.
pub const DEFAULT_QUEUE_NAME: &str = "orders";

/// A source of configuration values keyed by environment variable name.
pub trait EnvSource {
    /// Raw value for `key`, or `None` when unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Immutable snapshot of the transport configuration.
///
/// Built once per publish call (or injected by the host) and never mutated
/// by the send path. Use [`TransportConfig::load`] for the process
/// environment or the `with_*` methods for programmatic construction:
///
/// ```
/// use mom_publish::TransportConfig;
///
/// let config = TransportConfig::default()
///     .with_legacy_credentials("orders-user", "s3cret")
///     .with_legacy_host("rabbitmq.internal")
///     .with_order_queue_name("orders-eu");
/// assert_eq!(config.order_queue(), "orders-eu");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    // ---
    /// Message bus connection string (`SERVICEBUS_CONNECTION_STRING`).
    pub connection_string: Option<String>,

    /// Explicit queue override for the connection-string transport. Not
    /// read from the environment.
    pub queue_name: Option<String>,

    /// `SERVICEBUS_QUEUE_NAME`.
    pub servicebus_queue_name: Option<String>,

    /// `ORDER_QUEUE_NAME`.
    pub order_queue_name: Option<String>,

    /// `USE_WORKLOAD_IDENTITY_AUTH == "true"`.
    pub use_workload_identity: bool,

    /// Fully qualified bus namespace for workload identity.
    pub namespace_host: Option<String>,

    /// Legacy broker host (`ORDER_QUEUE_HOSTNAME`).
    pub legacy_host: Option<String>,

    /// Legacy broker port (`ORDER_QUEUE_PORT`).
    pub legacy_port: Option<u16>,

    /// `ORDER_QUEUE_USERNAME`.
    pub legacy_username: Option<String>,

    /// `ORDER_QUEUE_PASSWORD`.
    pub legacy_password: Option<String>,

    /// Socket transport override (`ORDER_QUEUE_TRANSPORT`).
    pub legacy_transport: Option<String>,

    /// `ORDER_QUEUE_RECONNECT_LIMIT`, default 0.
    pub reconnect_limit: u32,
}

impl TransportConfig {
    // ---
    /// Read the process environment.
    pub fn load() -> Self {
        Self::from_source(&ProcessEnv)
    }

    /// Read any [`EnvSource`].
    ///
    /// Empty values are treated as unset. Unparsable numbers are logged and
    /// treated as unset (port) or zero (reconnect limit).
    pub fn from_source<S: EnvSource + ?Sized>(source: &S) -> Self {
        // ---
        let get = |key: &str| source.var(key).filter(|v| !v.is_empty());

        let legacy_host = get(vars::ORDER_QUEUE_HOSTNAME);
        let namespace_host = legacy_host
            .clone()
            .or_else(|| get(vars::AZURE_SERVICEBUS_FULLYQUALIFIEDNAMESPACE));

        let legacy_port = get(vars::ORDER_QUEUE_PORT).and_then(|raw| match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(e) => {
                log_warn!("ignoring {}={raw:?}: {e}", vars::ORDER_QUEUE_PORT);
                None
            }
        });

        let reconnect_limit = get(vars::ORDER_QUEUE_RECONNECT_LIMIT)
            .map(|raw| match raw.parse::<u32>() {
                Ok(limit) => limit,
                Err(e) => {
                    log_warn!("ignoring {}={raw:?}: {e}", vars::ORDER_QUEUE_RECONNECT_LIMIT);
                    0
                }
            })
            .unwrap_or(0);

        Self {
            connection_string: get(vars::SERVICEBUS_CONNECTION_STRING),
            queue_name: None,
            servicebus_queue_name: get(vars::SERVICEBUS_QUEUE_NAME),
            order_queue_name: get(vars::ORDER_QUEUE_NAME),
            use_workload_identity: source.var(vars::USE_WORKLOAD_IDENTITY_AUTH).as_deref()
                == Some("true"),
            namespace_host,
            legacy_host,
            legacy_port,
            legacy_username: get(vars::ORDER_QUEUE_USERNAME),
            legacy_password: get(vars::ORDER_QUEUE_PASSWORD),
            legacy_transport: get(vars::ORDER_QUEUE_TRANSPORT),
            reconnect_limit,
        }
    }

    /// Queue for the connection-string transport.
    ///
    /// Explicit override, then `SERVICEBUS_QUEUE_NAME`, then
    /// `ORDER_QUEUE_NAME`, then [`DEFAULT_QUEUE_NAME`].
    pub fn connection_string_queue(&self) -> &str {
        present(&self.queue_name)
            .or(present(&self.servicebus_queue_name))
            .or(present(&self.order_queue_name))
            .unwrap_or(DEFAULT_QUEUE_NAME)
    }

    /// Queue for the workload-identity and legacy transports.
    pub fn order_queue(&self) -> &str {
        present(&self.order_queue_name).unwrap_or(DEFAULT_QUEUE_NAME)
    }

    /// Whether both legacy credentials are present.
    pub fn has_legacy_credentials(&self) -> bool {
        present(&self.legacy_username).is_some() && present(&self.legacy_password).is_some()
    }

    /// Copy with every empty string value replaced by `None`.
    ///
    /// Values built with `with_*` or deserialized are not filtered on the way
    /// in; selection works on the normalized copy.
    pub fn normalized(&self) -> Self {
        // ---
        let keep = |v: &Option<String>| present(v).map(str::to_string);

        Self {
            connection_string: keep(&self.connection_string),
            queue_name: keep(&self.queue_name),
            servicebus_queue_name: keep(&self.servicebus_queue_name),
            order_queue_name: keep(&self.order_queue_name),
            use_workload_identity: self.use_workload_identity,
            namespace_host: keep(&self.namespace_host),
            legacy_host: keep(&self.legacy_host),
            legacy_port: self.legacy_port,
            legacy_username: keep(&self.legacy_username),
            legacy_password: keep(&self.legacy_password),
            legacy_transport: keep(&self.legacy_transport),
            reconnect_limit: self.reconnect_limit,
        }
    }

    /// Set the connection string.
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the explicit queue override (connection-string transport only).
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = Some(name.into());
        self
    }

    pub fn with_servicebus_queue_name(mut self, name: impl Into<String>) -> Self {
        self.servicebus_queue_name = Some(name.into());
        self
    }

    pub fn with_order_queue_name(mut self, name: impl Into<String>) -> Self {
        self.order_queue_name = Some(name.into());
        self
    }

    /// Enable workload identity against `namespace_host`.
    pub fn with_workload_identity(mut self, namespace_host: Option<String>) -> Self {
        self.use_workload_identity = true;
        self.namespace_host = namespace_host;
        self
    }

    pub fn with_legacy_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.legacy_username = Some(username.into());
        self.legacy_password = Some(password.into());
        self
    }

    pub fn with_legacy_host(mut self, host: impl Into<String>) -> Self {
        self.legacy_host = Some(host.into());
        self
    }

    pub fn with_legacy_port(mut self, port: u16) -> Self {
        self.legacy_port = Some(port);
        self
    }

    pub fn with_legacy_transport(mut self, transport: impl Into<String>) -> Self {
        self.legacy_transport = Some(transport.into());
        self
    }

    pub fn with_reconnect_limit(mut self, limit: u32) -> Self {
        self.reconnect_limit = limit;
        self
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("connection_string", &redact(&self.connection_string))
            .field("queue_name", &self.queue_name)
            .field("servicebus_queue_name", &self.servicebus_queue_name)
            .field("order_queue_name", &self.order_queue_name)
            .field("use_workload_identity", &self.use_workload_identity)
            .field("namespace_host", &self.namespace_host)
            .field("legacy_host", &self.legacy_host)
            .field("legacy_port", &self.legacy_port)
            .field("legacy_username", &self.legacy_username)
            .field("legacy_password", &redact(&self.legacy_password))
            .field("legacy_transport", &self.legacy_transport)
            .field("reconnect_limit", &self.reconnect_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn env(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_environment_is_all_absent() {
        // ---
        let config = TransportConfig::from_source(&env(&[]));

        assert_eq!(config, TransportConfig::default());
        assert_eq!(config.connection_string_queue(), "orders");
        assert_eq!(config.order_queue(), "orders");
    }

    #[test]
    fn empty_values_count_as_unset() {
        // ---
        let config = TransportConfig::from_source(&env(&[
            (vars::SERVICEBUS_CONNECTION_STRING, ""),
            (vars::ORDER_QUEUE_USERNAME, "user"),
            (vars::ORDER_QUEUE_PASSWORD, ""),
        ]));

        assert!(config.connection_string.is_none());
        assert!(!config.has_legacy_credentials());
    }

    #[test]
    fn workload_identity_requires_exact_true() {
        // ---
        for (raw, expected) in [("true", true), ("TRUE", false), ("1", false), ("yes", false)] {
            let config =
                TransportConfig::from_source(&env(&[(vars::USE_WORKLOAD_IDENTITY_AUTH, raw)]));
            assert_eq!(config.use_workload_identity, expected, "value {raw:?}");
        }
    }

    #[test]
    fn hostname_wins_over_fully_qualified_namespace() {
        // ---
        let both = TransportConfig::from_source(&env(&[
            (vars::ORDER_QUEUE_HOSTNAME, "orders.example.net"),
            (vars::AZURE_SERVICEBUS_FULLYQUALIFIEDNAMESPACE, "ns.servicebus.windows.net"),
        ]));
        let fqns_only = TransportConfig::from_source(&env(&[(
            vars::AZURE_SERVICEBUS_FULLYQUALIFIEDNAMESPACE,
            "ns.servicebus.windows.net",
        )]));

        assert_eq!(both.namespace_host.as_deref(), Some("orders.example.net"));
        assert_eq!(
            fqns_only.namespace_host.as_deref(),
            Some("ns.servicebus.windows.net")
        );
        assert!(fqns_only.legacy_host.is_none());
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        // ---
        let config = TransportConfig::from_source(&env(&[
            (vars::ORDER_QUEUE_PORT, "amqp"),
            (vars::ORDER_QUEUE_RECONNECT_LIMIT, "-1"),
        ]));

        assert_eq!(config.legacy_port, None);
        assert_eq!(config.reconnect_limit, 0);

        let config = TransportConfig::from_source(&env(&[
            (vars::ORDER_QUEUE_PORT, "5671"),
            (vars::ORDER_QUEUE_RECONNECT_LIMIT, "3"),
        ]));

        assert_eq!(config.legacy_port, Some(5671));
        assert_eq!(config.reconnect_limit, 3);
    }

    #[test]
    fn connection_string_queue_fallback_chain() {
        // ---
        let base = TransportConfig::default().with_connection_string("cs1");

        assert_eq!(base.connection_string_queue(), "orders");

        let order_only = base.clone().with_order_queue_name("custom");
        assert_eq!(order_only.connection_string_queue(), "custom");

        let servicebus = order_only.clone().with_servicebus_queue_name("sb-orders");
        assert_eq!(servicebus.connection_string_queue(), "sb-orders");

        let explicit = servicebus.with_queue_name("explicit");
        assert_eq!(explicit.connection_string_queue(), "explicit");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        // ---
        let config = TransportConfig::default()
            .with_connection_string("Endpoint=sb://x/;SharedAccessKey=abc")
            .with_legacy_credentials("user", "hunter2");

        let rendered = format!("{config:?}");

        assert!(!rendered.contains("SharedAccessKey"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("user"));
    }

    #[test]
    fn deserializes_with_defaults() {
        // ---
        let config: TransportConfig = serde_json::from_str(
            r#"{ "legacy_username": "u", "legacy_password": "p", "legacy_port": 5672 }"#,
        )
        .expect("config should deserialize");

        assert!(config.has_legacy_credentials());
        assert_eq!(config.legacy_port, Some(5672));
        assert_eq!(config.reconnect_limit, 0);
        assert!(!config.use_workload_identity);
    }

    #[test]
    fn empty_strings_are_absent_after_normalizing() {
        // ---
        let deserialized: TransportConfig = serde_json::from_str(
            r#"{ "connection_string": "", "order_queue_name": "", "legacy_username": "u" }"#,
        )
        .expect("config should deserialize");
        let built = TransportConfig::default()
            .with_connection_string("")
            .with_legacy_credentials("u", "");

        let normalized = deserialized.normalized();

        assert_eq!(normalized.connection_string, None);
        assert_eq!(normalized.order_queue_name, None);
        assert_eq!(normalized.legacy_username.as_deref(), Some("u"));
        assert_eq!(deserialized.order_queue(), "orders");
        assert_eq!(built.normalized().connection_string, None);
        assert!(!built.has_legacy_credentials());
    }
}

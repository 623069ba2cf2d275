//! Publisher façade.
//!
//! [`Publisher`] is the one capability exposed to the host application:
//! hand it a message and it loads the configuration, picks the transport,
//! sends, and reports what happened.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::selector::Resolution;
use crate::{
    //
    log_error,
    log_info,
    Deadline,
    Delivery,
    EnvSource,
    Message,
    PublishOutcome,
    PublishResult,
    SkipReason,
    TransportConfig,
    TransportSelector,
};

/// Where a publisher gets its configuration.
#[derive(Clone)]
pub enum ConfigSource {
    /// Read on every call, so changes between calls are honored.
    Environment(Arc<dyn EnvSource + Send + Sync>),

    /// Injected once by the host.
    Fixed(TransportConfig),
}

impl ConfigSource {
    /// Configuration for one call.
    pub fn snapshot(&self) -> TransportConfig {
        match self {
            ConfigSource::Environment(source) => TransportConfig::from_source(source.as_ref()),
            ConfigSource::Fixed(config) => config.clone(),
        }
    }
}

/// One-shot message publisher.
///
/// Cheap to clone; clones share collaborators and configuration source but
/// no connection, since none outlives a call.
///
/// # Example
///
/// ```
/// use mom_publish::{broker::memory::MemoryBroker, PublishOutcome, PublisherBuilder, TransportConfig};
///
/// # async fn example() -> mom_publish::Result<()> {
/// let broker = MemoryBroker::new();
/// let publisher = PublisherBuilder::new()
///     .selector(broker.selector())
///     .config(TransportConfig::default().with_connection_string("Endpoint=sb://example/"))
///     .build();
///
/// let outcome = publisher.send_message("hello").await?;
/// assert_eq!(outcome.queue(), Some("orders"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<Inner>,
}

struct Inner {
    selector: TransportSelector,
    config: ConfigSource,
    timeout: Option<Duration>,
}

/// Log line for a skipped publish.
fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoHostname => "No hostname set for message queue. Exiting.",
        SkipReason::NoCredentials => {
            "No credentials set for message queue. Please configure \
             SERVICEBUS_CONNECTION_STRING or other authentication method. Exiting."
        }
    }
}

impl Publisher {
    // ---
    /// Create a publisher (internal use by PublisherBuilder).
    pub(crate) fn new(
        selector: TransportSelector,
        config: ConfigSource,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                selector,
                config,
                timeout,
            }),
        }
    }

    /// Configuration the next call would use.
    pub fn config(&self) -> TransportConfig {
        self.inner.config.snapshot()
    }

    /// Per-call timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Send one message and wait for the outcome.
    ///
    /// Returns `Ok(Skipped)` when no transport is configured; that is not an
    /// error. Setup and send failures are returned, never swallowed.
    pub async fn send_message(&self, message: impl Into<Message>) -> PublishResult {
        self.send_message_with(message, CancellationToken::new())
            .await
    }

    /// [`send_message`](Self::send_message) with caller-driven cancellation.
    ///
    /// Cancelling `token` abandons the in-flight broker step; anything
    /// already opened is still closed before this returns
    /// [`PublishError::Cancelled`](crate::PublishError::Cancelled).
    pub async fn send_message_with(
        &self,
        message: impl Into<Message>,
        token: CancellationToken,
    ) -> PublishResult {
        // ---
        let message = message.into();
        let config = self.config();

        let (transport, queue) = match self.inner.selector.resolve(&config) {
            Resolution::Transport { transport, queue } => (transport, queue),
            Resolution::Skipped(reason) => {
                log_info!("{}", skip_message(reason));
                return Ok(PublishOutcome::Skipped(reason));
            }
        };

        let kind = transport.kind();
        log_info!(
            "Sending message {message} to {queue} using {}",
            kind.describe()
        );

        let deadline = Deadline::new(token, self.inner.timeout);

        match transport.publish(&queue, message, &deadline).await {
            Ok(()) => {
                log_info!("Message sent successfully to queue {queue}");
                Ok(PublishOutcome::Delivered(Delivery {
                    transport: kind,
                    queue,
                }))
            }
            Err(e) => {
                log_error!("Error sending message to {queue}: {e}");
                Err(e)
            }
        }
    }

    /// Fire-and-forget send on a spawned task.
    ///
    /// The caller is not blocked on broker I/O. Failures are logged by
    /// [`send_message`](Self::send_message) and the outcome stays available
    /// through the returned handle. Must be called within a tokio runtime.
    pub fn dispatch(&self, message: impl Into<Message>) -> JoinHandle<PublishResult> {
        // ---
        let publisher = self.clone();
        let message = message.into();

        tokio::spawn(async move { publisher.send_message(message).await })
    }
}

use thiserror::Error;

use crate::TransportKind;

/// Errors that can occur while publishing a message.
///
/// "No transport configured" is deliberately absent: it is reported as
/// [`PublishOutcome::Skipped`](crate::PublishOutcome::Skipped), not an error.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Client, credential, connection or sender construction failed.
    #[error("{transport} transport setup failed: {reason}")]
    Setup {
        transport: TransportKind,
        reason: String,
    },

    /// The broker client rejected or failed the send itself.
    #[error("{transport} transport failed to send to queue {queue}: {reason}")]
    Send {
        transport: TransportKind,
        queue: String,
        reason: String,
    },

    /// The per-call deadline elapsed before the publish completed.
    #[error("{transport} transport timed out")]
    Timeout { transport: TransportKind },

    /// The caller cancelled the publish.
    #[error("{transport} transport publish cancelled")]
    Cancelled { transport: TransportKind },
}

impl PublishError {
    /// Transport that produced this error.
    pub fn transport(&self) -> TransportKind {
        match self {
            PublishError::Setup { transport, .. }
            | PublishError::Send { transport, .. }
            | PublishError::Timeout { transport }
            | PublishError::Cancelled { transport } => *transport,
        }
    }

    /// Whether a caller-side retry could reasonably succeed.
    ///
    /// Cancellation was requested by the caller, so it is never retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PublishError::Cancelled { .. })
    }

    pub(crate) fn setup(transport: TransportKind, reason: impl ToString) -> Self {
        PublishError::Setup {
            transport,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn send(transport: TransportKind, queue: &str, reason: impl ToString) -> Self {
        PublishError::Send {
            transport,
            queue: queue.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Error type returned by broker collaborators.
///
/// Collaborator implementations wrap whatever their client library raises;
/// transports map it into [`PublishError`] at the boundary.
pub type BrokerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for broker collaborator calls.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Result type alias for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn only_cancellation_is_not_retryable() {
        // ---
        let kind = TransportKind::ConnectionString;

        assert!(PublishError::setup(kind, "no route").is_retryable());
        assert!(PublishError::send(kind, "orders", "rejected").is_retryable());
        assert!(PublishError::Timeout { transport: kind }.is_retryable());
        assert!(!PublishError::Cancelled { transport: kind }.is_retryable());
    }

    #[test]
    fn send_error_names_transport_and_queue() {
        // ---
        let err = PublishError::send(TransportKind::LegacyCredential, "orders", "link detached");

        assert_eq!(err.transport(), TransportKind::LegacyCredential);
        assert_eq!(
            err.to_string(),
            "legacy-credential transport failed to send to queue orders: link detached"
        );
    }
}

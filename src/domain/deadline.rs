// src/domain/deadline.rs

//! Per-call cancellation and deadline.
//!
//! Every broker step a transport performs is raced against the caller's
//! [`CancellationToken`] and an optional deadline. When either fires the
//! step's future is dropped and the transport proceeds straight to releasing
//! whatever it has already acquired. Release steps are never raced, so a
//! sender or connection is always closed once acquired.

use std::future::Future;

use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{PublishError, Result, TransportKind};

/// Cancellation token plus optional deadline for one publish call.
#[derive(Debug, Clone)]
pub struct Deadline {
    // ---
    token: CancellationToken,
    at: Option<Instant>,
}

impl Deadline {
    // ---
    /// Never times out and can only be cancelled through [`token`](Self::token).
    pub fn none() -> Self {
        Self {
            token: CancellationToken::new(),
            at: None,
        }
    }

    /// Build from a caller token and an optional timeout measured from now.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            at: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    /// Run `step` unless cancellation or the deadline wins the race.
    pub async fn guard<F, T>(&self, transport: TransportKind, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        // ---
        let expired = async {
            match self.at {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(PublishError::Cancelled { transport }),
            _ = expired => Err(PublishError::Timeout { transport }),
            result = step => result,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const KIND: TransportKind = TransportKind::ConnectionString;

    #[tokio::test]
    async fn completed_step_passes_through() {
        // ---
        let deadline = Deadline::none();

        let value = deadline.guard(KIND, async { Ok(7) }).await;

        assert_eq!(value.expect("step should complete"), 7);
    }

    #[tokio::test]
    async fn cancelled_token_wins_over_pending_step() {
        // ---
        let deadline = Deadline::none();
        deadline.token().cancel();

        let result = deadline
            .guard(KIND, std::future::pending::<Result<()>>())
            .await;

        assert!(matches!(result, Err(PublishError::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_times_out() {
        // ---
        let deadline = Deadline::new(CancellationToken::new(), Some(Duration::from_secs(5)));

        let result = deadline
            .guard(KIND, std::future::pending::<Result<()>>())
            .await;

        assert!(matches!(
            result,
            Err(PublishError::Timeout {
                transport: TransportKind::ConnectionString
            })
        ));
    }

    #[tokio::test]
    async fn unrepresentable_timeout_means_no_deadline() {
        // ---
        let deadline = Deadline::new(CancellationToken::new(), Some(Duration::MAX));

        let value = deadline.guard(KIND, async { Ok(1) }).await;

        assert!(deadline.at().is_none());
        assert_eq!(value.expect("step should complete"), 1);
    }
}

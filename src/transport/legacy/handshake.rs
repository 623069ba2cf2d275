// src/transport/legacy/handshake.rs

//! Legacy send handshake.
//!
//! A legacy publish walks a fixed path:
//!
//! ```text
//! Connecting ──sendable──▶ Sendable ──send──▶ Sent ──close──▶ Closed
//!      │                      │
//!      └──────── close ───────┴──────────────────────────────▶ Closed
//! ```
//!
//! The send may only happen once the link reports it is sendable, and the
//! connection is closed straight after the single send. Any state can close
//! early when something fails.

use std::fmt;

use tokio::sync::mpsc;

use crate::{log_debug, LinkEvent, PublishError, Result, TransportKind};

const KIND: TransportKind = TransportKind::LegacyCredential;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Connection and sender link requested; not yet allowed to send.
    Connecting,
    /// The link reported credit; exactly one send may follow.
    Sendable,
    /// The message was handed to the link.
    Sent,
    /// Sender and connection released.
    Closed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one publish through [`HandshakeState`].
#[derive(Debug)]
pub struct Handshake {
    // ---
    state: HandshakeState,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Connecting,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Move to `next`, rejecting transitions off the path above.
    pub fn advance(&mut self, next: HandshakeState) -> Result<()> {
        // ---
        use HandshakeState::*;

        let allowed = matches!(
            (self.state, next),
            (Connecting, Sendable) | (Sendable, Sent) | (Connecting | Sendable | Sent, Closed)
        );

        if !allowed {
            return Err(PublishError::setup(
                KIND,
                format!("invalid handshake transition {} -> {next}", self.state),
            ));
        }

        log_debug!("[{KIND}] handshake {} -> {next}", self.state);
        self.state = next;
        Ok(())
    }

    /// Wait on `events` until the link becomes sendable, then advance.
    ///
    /// Link errors and the event stream ending first are setup failures.
    /// The wait itself is not bounded here; callers race it against their
    /// [`Deadline`](crate::Deadline).
    pub async fn await_sendable(&mut self, events: &mut mpsc::Receiver<LinkEvent>) -> Result<()> {
        // ---
        loop {
            match events.recv().await {
                Some(LinkEvent::Sendable) => return self.advance(HandshakeState::Sendable),
                Some(LinkEvent::ConnectionOpened) => {
                    log_debug!("[{KIND}] connection opened, waiting for sender credit");
                }
                Some(LinkEvent::Error(reason)) => {
                    return Err(PublishError::setup(KIND, format!("link error: {reason}")));
                }
                Some(LinkEvent::Disconnected) | None => {
                    return Err(PublishError::setup(
                        KIND,
                        "connection closed before sender became sendable",
                    ));
                }
            }
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use HandshakeState::*;

    #[test]
    fn happy_path_is_accepted() {
        // ---
        let mut handshake = Handshake::new();

        for next in [Sendable, Sent, Closed] {
            handshake.advance(next).expect("transition on the happy path");
        }

        assert_eq!(handshake.state(), Closed);
    }

    #[test]
    fn cannot_send_before_sendable() {
        // ---
        let mut handshake = Handshake::new();

        assert!(handshake.advance(Sent).is_err());
        assert_eq!(handshake.state(), Connecting);
    }

    #[test]
    fn closed_is_terminal() {
        // ---
        let mut handshake = Handshake::new();
        handshake.advance(Closed).expect("early close");

        assert!(handshake.advance(Sendable).is_err());
        assert!(handshake.advance(Closed).is_err());
    }

    #[tokio::test]
    async fn waits_past_open_event_for_sendable() {
        // ---
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(LinkEvent::ConnectionOpened).await.expect("send event");
        tx.send(LinkEvent::Sendable).await.expect("send event");

        let mut handshake = Handshake::new();
        handshake
            .await_sendable(&mut rx)
            .await
            .expect("link should become sendable");

        assert_eq!(handshake.state(), Sendable);
    }

    #[tokio::test]
    async fn dropped_event_stream_is_setup_failure() {
        // ---
        let (tx, mut rx) = mpsc::channel::<LinkEvent>(1);
        drop(tx);

        let mut handshake = Handshake::new();
        let err = handshake
            .await_sendable(&mut rx)
            .await
            .expect_err("closed stream cannot become sendable");

        assert!(matches!(err, PublishError::Setup { .. }));
        assert_eq!(handshake.state(), Connecting);
    }

    #[tokio::test]
    async fn link_error_is_reported() {
        // ---
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(LinkEvent::Error("amqp:unauthorized-access".into()))
            .await
            .expect("send event");

        let err = Handshake::new()
            .await_sendable(&mut rx)
            .await
            .expect_err("link error");

        assert!(err.to_string().contains("amqp:unauthorized-access"));
    }
}

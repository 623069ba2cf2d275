// src/domain/outcome.rs

//! Publish outcomes.
//!
//! A publish either delivers, is skipped because no transport is configured,
//! or fails with a [`PublishError`](crate::PublishError). Skips are not
//! errors: an operator may leave messaging unconfigured on purpose.

use std::fmt;

use super::TransportKind;

/// Result of one publish call.
pub type PublishResult = crate::Result<PublishOutcome>;

/// Why a publish was skipped without touching any broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Workload identity is enabled but no namespace host is configured.
    NoHostname,

    /// None of the transports has the configuration it needs.
    NoCredentials,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoHostname => f.write_str("no hostname set"),
            SkipReason::NoCredentials => f.write_str("no credentials configured"),
        }
    }
}

/// A completed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Transport that carried the message.
    pub transport: TransportKind,
    /// Queue the message was sent to.
    pub queue: String,
}

/// Non-error result of a publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The message was handed to the broker.
    Delivered(Delivery),

    /// No transport was eligible; nothing was sent.
    Skipped(SkipReason),
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PublishOutcome::Skipped(_))
    }

    /// Queue the message went to, if it was delivered.
    pub fn queue(&self) -> Option<&str> {
        match self {
            PublishOutcome::Delivered(delivery) => Some(&delivery.queue),
            PublishOutcome::Skipped(_) => None,
        }
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Delivered(d) => write!(f, "delivered to {} via {}", d.queue, d.transport),
            PublishOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

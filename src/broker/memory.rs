// src/broker/memory.rs

//! In-memory reference broker.
//!
//! [`MemoryBroker`] implements every collaborator trait in-process. It is
//! intended for tests and local execution, and it defines the reference
//! behavior the real clients are expected to approximate:
//!
//! - opening a client, sender or connection always succeeds unless a
//!   [`FailPoint`] is armed for that step;
//! - a successful send appends the message to the queue's record;
//! - a legacy sender link reports `ConnectionOpened` then `Sendable`, unless
//!   a different [`LinkBehavior`] is configured;
//! - bus sender creation and bus sends hang when stalled with
//!   [`MemoryBroker::stall_at`], so cancellation and deadlines can be
//!   exercised mid-publish.
//!
//! Every call, successful or not, is counted in [`CallCounts`], so tests can
//! assert both that resources are released exactly once and that skipped
//! publishes never touch a broker.
//!
//! Clones share state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    //
    AmqpConnectOptions,
    AmqpConnection,
    AmqpConnector,
    AmqpSender,
    BrokerResult,
    BusClient,
    BusClientFactory,
    BusMessage,
    BusSender,
    CredentialProvider,
    CredentialPtr,
    LinkEvent,
    PendingLink,
    TokenCredential,
    TransportSelector,
};

/// A broker step that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Credential,
    BusOpenClient,
    BusCreateSender,
    BusSend,
    BusCloseSender,
    BusCloseClient,
    AmqpConnect,
    AmqpOpenSender,
    AmqpSend,
    AmqpCloseSender,
    AmqpCloseConnection,
}

/// How a legacy sender link progresses after it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkBehavior {
    /// `ConnectionOpened`, then `Sendable`.
    #[default]
    Sendable,
    /// `ConnectionOpened`, then nothing until the publish gives up.
    NeverSendable,
    /// The broker refuses the link with the given condition.
    Refuse(String),
    /// The peer drops the connection before granting credit.
    Disconnect,
}

/// Number of calls made on each collaborator method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub credential_calls: usize,
    pub bus_client_opens: usize,
    pub bus_sender_opens: usize,
    pub bus_sends: usize,
    pub bus_sender_closes: usize,
    pub bus_client_closes: usize,
    pub amqp_connects: usize,
    pub amqp_sender_opens: usize,
    pub amqp_sends: usize,
    pub amqp_sender_closes: usize,
    pub amqp_connection_closes: usize,
}

impl CallCounts {
    /// Sum of all calls.
    pub fn total(&self) -> usize {
        self.credential_calls
            + self.bus_client_opens
            + self.bus_sender_opens
            + self.bus_sends
            + self.bus_sender_closes
            + self.bus_client_closes
            + self.amqp_connects
            + self.amqp_sender_opens
            + self.amqp_sends
            + self.amqp_sender_closes
            + self.amqp_connection_closes
    }
}

#[derive(Default)]
struct State {
    calls: CallCounts,
    fail_points: HashSet<FailPoint>,
    stall_points: HashSet<FailPoint>,
    link_behavior: LinkBehavior,
    bus_queues: HashMap<String, Vec<BusMessage>>,
    amqp_queues: HashMap<String, Vec<Bytes>>,
    last_connection_string: Option<String>,
    last_namespace: Option<String>,
    last_amqp_options: Option<AmqpConnectOptions>,
    // Keeps NeverSendable event streams open.
    parked_links: Vec<mpsc::Sender<LinkEvent>>,
}

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process broker implementing all collaborator traits.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    // ---
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `point` fail on every subsequent call.
    pub fn fail_at(&self, point: FailPoint) {
        lock_ignore_poison(&self.state).fail_points.insert(point);
    }

    /// Make `point` hang after being counted. Honored by
    /// [`FailPoint::BusCreateSender`] and [`FailPoint::BusSend`].
    pub fn stall_at(&self, point: FailPoint) {
        lock_ignore_poison(&self.state).stall_points.insert(point);
    }

    /// Stop failing or stalling at `point`.
    pub fn heal(&self, point: FailPoint) {
        let mut state = lock_ignore_poison(&self.state);
        state.fail_points.remove(&point);
        state.stall_points.remove(&point);
    }

    pub fn set_link_behavior(&self, behavior: LinkBehavior) {
        lock_ignore_poison(&self.state).link_behavior = behavior;
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        lock_ignore_poison(&self.state).calls.clone()
    }

    /// Messages delivered to `queue` through the message bus.
    pub fn bus_messages(&self, queue: &str) -> Vec<BusMessage> {
        lock_ignore_poison(&self.state)
            .bus_queues
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Data sections delivered to `queue` through the legacy broker.
    pub fn amqp_messages(&self, queue: &str) -> Vec<Bytes> {
        lock_ignore_poison(&self.state)
            .amqp_queues
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_connection_string(&self) -> Option<String> {
        lock_ignore_poison(&self.state).last_connection_string.clone()
    }

    pub fn last_namespace(&self) -> Option<String> {
        lock_ignore_poison(&self.state).last_namespace.clone()
    }

    pub fn last_amqp_options(&self) -> Option<AmqpConnectOptions> {
        lock_ignore_poison(&self.state).last_amqp_options.clone()
    }

    pub fn bus(&self) -> Arc<dyn BusClientFactory> {
        Arc::new(self.clone())
    }

    pub fn credentials(&self) -> Arc<dyn CredentialProvider> {
        Arc::new(self.clone())
    }

    pub fn amqp(&self) -> Arc<dyn AmqpConnector> {
        Arc::new(self.clone())
    }

    /// A selector wired entirely to this broker.
    pub fn selector(&self) -> TransportSelector {
        TransportSelector::new(self.bus(), self.credentials(), self.amqp())
    }

    /// Count a call, then fail if `point` is armed.
    fn record(&self, point: FailPoint, count: impl FnOnce(&mut CallCounts)) -> BrokerResult<()> {
        // ---
        let mut state = lock_ignore_poison(&self.state);
        count(&mut state.calls);

        if state.fail_points.contains(&point) {
            return Err(format!("injected failure at {point:?}").into());
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut lock_ignore_poison(&self.state))
    }

    /// Never completes while `point` is stalled.
    async fn stall(&self, point: FailPoint) {
        if self.with_state(|s| s.stall_points.contains(&point)) {
            std::future::pending::<()>().await;
        }
    }
}

//
// Credentials
//

/// A fixed token credential.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    source: String,
    token: String,
}

impl StaticCredential {
    pub fn new(source: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenCredential for StaticCredential {
    fn source(&self) -> &str {
        &self.source
    }

    async fn get_token(&self, _scope: &str) -> BrokerResult<String> {
        Ok(self.token.clone())
    }
}

#[async_trait::async_trait]
impl CredentialProvider for MemoryBroker {
    async fn default_credential(&self) -> BrokerResult<CredentialPtr> {
        // ---
        self.record(FailPoint::Credential, |c| c.credential_calls += 1)?;
        Ok(Arc::new(StaticCredential::new("memory", "memory-token")))
    }
}

//
// Message bus
//

struct MemoryBusClient {
    broker: MemoryBroker,
}

struct MemoryBusSender {
    broker: MemoryBroker,
    queue: String,
}

#[async_trait::async_trait]
impl BusClientFactory for MemoryBroker {
    // ---
    async fn from_connection_string(
        &self,
        connection_string: &str,
    ) -> BrokerResult<Box<dyn BusClient>> {
        // ---
        self.record(FailPoint::BusOpenClient, |c| c.bus_client_opens += 1)?;
        self.with_state(|s| s.last_connection_string = Some(connection_string.to_string()));

        Ok(Box::new(MemoryBusClient {
            broker: self.clone(),
        }))
    }

    async fn from_credential(
        &self,
        namespace: &str,
        _credential: CredentialPtr,
    ) -> BrokerResult<Box<dyn BusClient>> {
        // ---
        self.record(FailPoint::BusOpenClient, |c| c.bus_client_opens += 1)?;
        self.with_state(|s| s.last_namespace = Some(namespace.to_string()));

        Ok(Box::new(MemoryBusClient {
            broker: self.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl BusClient for MemoryBusClient {
    async fn create_sender(&self, queue: &str) -> BrokerResult<Box<dyn BusSender>> {
        // ---
        self.broker
            .record(FailPoint::BusCreateSender, |c| c.bus_sender_opens += 1)?;
        self.broker.stall(FailPoint::BusCreateSender).await;

        Ok(Box::new(MemoryBusSender {
            broker: self.broker.clone(),
            queue: queue.to_string(),
        }))
    }

    async fn close(&self) -> BrokerResult<()> {
        self.broker
            .record(FailPoint::BusCloseClient, |c| c.bus_client_closes += 1)
    }
}

#[async_trait::async_trait]
impl BusSender for MemoryBusSender {
    async fn send(&self, message: BusMessage) -> BrokerResult<()> {
        // ---
        self.broker.record(FailPoint::BusSend, |c| c.bus_sends += 1)?;
        self.broker.stall(FailPoint::BusSend).await;
        self.broker.with_state(|s| {
            s.bus_queues
                .entry(self.queue.clone())
                .or_default()
                .push(message)
        });
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        self.broker
            .record(FailPoint::BusCloseSender, |c| c.bus_sender_closes += 1)
    }
}

//
// Legacy AMQP
//

struct MemoryAmqpConnection {
    broker: MemoryBroker,
}

struct MemoryAmqpSender {
    broker: MemoryBroker,
    address: String,
}

#[async_trait::async_trait]
impl AmqpConnector for MemoryBroker {
    async fn connect(&self, options: &AmqpConnectOptions) -> BrokerResult<Box<dyn AmqpConnection>> {
        // ---
        self.record(FailPoint::AmqpConnect, |c| c.amqp_connects += 1)?;
        self.with_state(|s| s.last_amqp_options = Some(options.clone()));

        Ok(Box::new(MemoryAmqpConnection {
            broker: self.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl AmqpConnection for MemoryAmqpConnection {
    async fn open_sender(&mut self, address: &str) -> BrokerResult<PendingLink> {
        // ---
        self.broker
            .record(FailPoint::AmqpOpenSender, |c| c.amqp_sender_opens += 1)?;

        let (tx, rx) = mpsc::channel(4);
        let behavior = self.broker.with_state(|s| s.link_behavior.clone());

        // Capacity covers every event queued here.
        let _ = tx.try_send(LinkEvent::ConnectionOpened);
        match behavior {
            LinkBehavior::Sendable => {
                let _ = tx.try_send(LinkEvent::Sendable);
            }
            LinkBehavior::NeverSendable => {
                self.broker.with_state(|s| s.parked_links.push(tx.clone()));
            }
            LinkBehavior::Refuse(condition) => {
                let _ = tx.try_send(LinkEvent::Error(condition));
            }
            LinkBehavior::Disconnect => {
                let _ = tx.try_send(LinkEvent::Disconnected);
            }
        }

        Ok(PendingLink {
            sender: Box::new(MemoryAmqpSender {
                broker: self.broker.clone(),
                address: address.to_string(),
            }),
            events: rx,
        })
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.broker
            .record(FailPoint::AmqpCloseConnection, |c| c.amqp_connection_closes += 1)
    }
}

#[async_trait::async_trait]
impl AmqpSender for MemoryAmqpSender {
    async fn send(&mut self, data: Bytes) -> BrokerResult<()> {
        // ---
        self.broker.record(FailPoint::AmqpSend, |c| c.amqp_sends += 1)?;
        self.broker.with_state(|s| {
            s.amqp_queues
                .entry(self.address.clone())
                .or_default()
                .push(data)
        });
        Ok(())
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.broker
            .record(FailPoint::AmqpCloseSender, |c| c.amqp_sender_closes += 1)
    }
}

// src/transport/legacy/transport.rs

//! Legacy AMQP transport implementation.

use std::sync::Arc;

use super::handshake::{Handshake, HandshakeState};
use crate::transport::bus::release;
use crate::{
    //
    log_debug,
    AmqpConnectOptions,
    AmqpConnection,
    AmqpConnector,
    Deadline,
    Message,
    PendingLink,
    PublishError,
    Result,
    Transport,
    TransportKind,
};

const KIND: TransportKind = TransportKind::LegacyCredential;

/// Publishes to a legacy AMQP broker with username/password auth.
///
/// Each call opens a connection, opens a sender link on the queue, waits for
/// the link to become sendable, sends one data-section message, then closes
/// the sender and the connection. Nothing is kept alive between calls.
pub struct LegacyCredentialTransport {
    // ---
    options: AmqpConnectOptions,
    connector: Arc<dyn AmqpConnector>,
}

impl LegacyCredentialTransport {
    pub fn new(options: AmqpConnectOptions, connector: Arc<dyn AmqpConnector>) -> Self {
        Self { options, connector }
    }

    /// Everything between connect and connection close.
    async fn send_on(
        &self,
        connection: &mut dyn AmqpConnection,
        handshake: &mut Handshake,
        queue: &str,
        message: &Message,
        deadline: &Deadline,
    ) -> Result<()> {
        // ---
        let PendingLink {
            mut sender,
            mut events,
        } = deadline
            .guard(KIND, async {
                connection
                    .open_sender(queue)
                    .await
                    .map_err(|e| PublishError::setup(KIND, format!("open sender on {queue}: {e}")))
            })
            .await?;

        let result = async {
            deadline
                .guard(KIND, handshake.await_sendable(&mut events))
                .await?;

            deadline
                .guard(KIND, async {
                    sender
                        .send(message.data_section())
                        .await
                        .map_err(|e| PublishError::send(KIND, queue, e))
                })
                .await?;

            handshake.advance(HandshakeState::Sent)
        }
        .await;

        release(KIND, "sender", sender.close().await);
        result
    }
}

#[async_trait::async_trait]
impl Transport for LegacyCredentialTransport {
    // ---
    fn kind(&self) -> TransportKind {
        KIND
    }

    async fn publish(&self, queue: &str, message: Message, deadline: &Deadline) -> Result<()> {
        // ---
        let mut handshake = Handshake::new();

        log_debug!(
            "[{KIND}] connecting to {}:{}",
            self.options.host,
            self.options.port
        );

        let mut connection = deadline
            .guard(KIND, async {
                self.connector.connect(&self.options).await.map_err(|e| {
                    PublishError::setup(
                        KIND,
                        format!(
                            "connect to {}:{}: {e}",
                            self.options.host, self.options.port
                        ),
                    )
                })
            })
            .await?;

        let result = self
            .send_on(connection.as_mut(), &mut handshake, queue, &message, deadline)
            .await;

        release(KIND, "connection", connection.close().await);
        handshake.advance(HandshakeState::Closed)?;
        result
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::broker::memory::{FailPoint, LinkBehavior, MemoryBroker};
    use crate::selector::DEFAULT_AMQP_PORT;
    use bytes::Bytes;
    use tokio::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn options() -> AmqpConnectOptions {
        AmqpConnectOptions {
            host: "rabbitmq".into(),
            port: DEFAULT_AMQP_PORT,
            username: "user".into(),
            password: "pass".into(),
            transport: None,
            reconnect_limit: 0,
        }
    }

    fn transport(broker: &MemoryBroker) -> LegacyCredentialTransport {
        LegacyCredentialTransport::new(options(), broker.amqp())
    }

    #[tokio::test]
    async fn sends_data_section_after_sendable_then_closes() {
        // ---
        let broker = MemoryBroker::new();

        transport(&broker)
            .publish("orders", Message::from("hello"), &Deadline::none())
            .await
            .expect("publish failed");

        assert_eq!(
            broker.amqp_messages("orders"),
            vec![Bytes::from_static(b"hello")]
        );
        let calls = broker.calls();
        assert_eq!(calls.amqp_connects, 1);
        assert_eq!(calls.amqp_sender_opens, 1);
        assert_eq!(calls.amqp_sender_closes, 1);
        assert_eq!(calls.amqp_connection_closes, 1);
        assert_eq!(broker.last_amqp_options(), Some(options()));
    }

    #[tokio::test]
    async fn send_failure_still_closes_sender_and_connection() {
        // ---
        let broker = MemoryBroker::new();
        broker.fail_at(FailPoint::AmqpSend);

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &Deadline::none())
            .await
            .expect_err("send should fail");

        assert!(matches!(err, PublishError::Send { .. }));
        let calls = broker.calls();
        assert_eq!(calls.amqp_sender_closes, 1);
        assert_eq!(calls.amqp_connection_closes, 1);
    }

    #[tokio::test]
    async fn link_refused_is_setup_failure_without_send() {
        // ---
        let broker = MemoryBroker::new();
        broker.set_link_behavior(LinkBehavior::Refuse("not-found".into()));

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &Deadline::none())
            .await
            .expect_err("refused link");

        assert!(matches!(err, PublishError::Setup { .. }));
        assert!(broker.amqp_messages("orders").is_empty());
        let calls = broker.calls();
        assert_eq!(calls.amqp_sender_closes, 1);
        assert_eq!(calls.amqp_connection_closes, 1);
    }

    #[tokio::test]
    async fn open_sender_failure_still_closes_connection() {
        // ---
        let broker = MemoryBroker::new();
        broker.fail_at(FailPoint::AmqpOpenSender);

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &Deadline::none())
            .await
            .expect_err("sender link should fail to open");

        assert!(matches!(err, PublishError::Setup { .. }));
        let calls = broker.calls();
        assert_eq!(calls.amqp_sender_opens, 1);
        assert_eq!(calls.amqp_sender_closes, 0);
        assert_eq!(calls.amqp_connection_closes, 1);
    }

    #[tokio::test]
    async fn peer_disconnect_before_sendable_is_setup_failure() {
        // ---
        let broker = MemoryBroker::new();
        broker.set_link_behavior(LinkBehavior::Disconnect);

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &Deadline::none())
            .await
            .expect_err("peer disconnected");

        assert!(matches!(
            err,
            PublishError::Setup {
                transport: TransportKind::LegacyCredential,
                ..
            }
        ));
        let calls = broker.calls();
        assert_eq!(calls.amqp_sends, 0);
        assert_eq!(calls.amqp_sender_closes, 1);
        assert_eq!(calls.amqp_connection_closes, 1);
    }

    #[tokio::test]
    async fn close_failures_do_not_mask_successful_send() {
        // ---
        for point in [FailPoint::AmqpCloseSender, FailPoint::AmqpCloseConnection] {
            let broker = MemoryBroker::new();
            broker.fail_at(point);

            transport(&broker)
                .publish("orders", Message::from("hello"), &Deadline::none())
                .await
                .expect("send succeeded, close failure is only logged");

            let calls = broker.calls();
            assert_eq!(calls.amqp_sender_closes, 1, "{point:?}");
            assert_eq!(calls.amqp_connection_closes, 1, "{point:?}");
            assert_eq!(broker.amqp_messages("orders").len(), 1, "{point:?}");
        }
    }

    #[tokio::test]
    async fn connect_failure_is_setup_failure() {
        // ---
        let broker = MemoryBroker::new();
        broker.fail_at(FailPoint::AmqpConnect);

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &Deadline::none())
            .await
            .expect_err("connect should fail");

        assert!(matches!(
            err,
            PublishError::Setup {
                transport: TransportKind::LegacyCredential,
                ..
            }
        ));
        assert_eq!(broker.calls().amqp_connection_closes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_while_waiting_for_sendable_releases_link() {
        // ---
        let broker = MemoryBroker::new();
        broker.set_link_behavior(LinkBehavior::NeverSendable);
        let deadline = Deadline::new(CancellationToken::new(), Some(Duration::from_secs(2)));

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &deadline)
            .await
            .expect_err("link never becomes sendable");

        assert!(matches!(err, PublishError::Timeout { .. }));
        assert!(broker.amqp_messages("orders").is_empty());
        let calls = broker.calls();
        assert_eq!(calls.amqp_sender_closes, 1);
        assert_eq!(calls.amqp_connection_closes, 1);
    }

    #[tokio::test]
    async fn cancellation_while_waiting_for_sendable_releases_link() {
        // ---
        let broker = MemoryBroker::new();
        broker.set_link_behavior(LinkBehavior::NeverSendable);
        let token = CancellationToken::new();
        let deadline = Deadline::new(token.clone(), None);

        let cancel = tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.cancel();
        });

        let err = transport(&broker)
            .publish("orders", Message::from("hello"), &deadline)
            .await
            .expect_err("publish should be cancelled");
        cancel.await.expect("cancel task panicked");

        assert!(matches!(err, PublishError::Cancelled { .. }));
        let calls = broker.calls();
        assert_eq!(calls.amqp_sender_closes, 1);
        assert_eq!(calls.amqp_connection_closes, 1);
    }
}

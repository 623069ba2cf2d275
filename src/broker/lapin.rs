//! Legacy AMQP connector using `lapin`.
//!
//! Maps the event-driven sender-link model onto an AMQP 0-9-1 broker
//! connection:
//!
//! - `connect()` opens the connection, retrying up to the configured
//!   reconnect limit with a fixed delay between attempts;
//! - `open_sender()` opens a channel in publisher-confirm mode and reports
//!   the link `Sendable` once the channel is ready;
//! - `send()` publishes the data section through the default exchange with
//!   the queue name as routing key and waits for the broker's confirm.
//!
//! Connection success and failure are logged at info and warn/error level.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use lapin::{
    //
    options::{BasicPublishOptions, ConfirmSelectOptions},
    uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo},
    BasicProperties,
    Channel,
    Connection,
    ConnectionProperties,
};
use tokio::sync::mpsc;

use crate::{
    //
    log_error,
    log_info,
    log_warn,
    AmqpConnectOptions,
    AmqpConnection,
    AmqpConnector,
    AmqpSender,
    BrokerError,
    BrokerResult,
    LinkEvent,
    PendingLink,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// AMQP connector backed by lapin.
#[derive(Debug, Clone, Default)]
pub struct LapinConnector {
    // ---
    reconnect_delay: Option<Duration>,
}

impl LapinConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the delay between connection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }
}

fn amqp_uri(options: &AmqpConnectOptions) -> AMQPUri {
    // ---
    AMQPUri {
        scheme: if options.is_tls() {
            AMQPScheme::AMQPS
        } else {
            AMQPScheme::AMQP
        },
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: options.username.clone(),
                password: options.password.clone(),
            },
            host: options.host.clone(),
            port: options.port,
        },
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl AmqpConnector for LapinConnector {
    async fn connect(&self, options: &AmqpConnectOptions) -> BrokerResult<Box<dyn AmqpConnection>> {
        // ---
        let uri = amqp_uri(options);
        let delay = self.reconnect_delay.unwrap_or(RECONNECT_DELAY);
        let mut attempt = 0;

        log_info!("Connecting to AMQP broker: {}:{}", options.host, options.port);

        loop {
            match Connection::connect_uri(uri.clone(), ConnectionProperties::default()).await {
                Ok(connection) => {
                    log_info!("Connected to AMQP broker");
                    return Ok(Box::new(LapinConnection { connection }));
                }
                Err(e) if attempt < options.reconnect_limit => {
                    attempt += 1;
                    log_warn!(
                        "amqp: connection attempt {attempt}/{} failed: {e}",
                        options.reconnect_limit
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    log_error!("amqp: connection failed: {e}");
                    return Err(e.into());
                }
            }
        }
    }
}

/// Run `close` when `step` failed and return the step's error.
async fn close_on_error<E, F, C, CE>(step: Result<(), E>, close: F) -> BrokerResult<()>
where
    E: Into<BrokerError>,
    F: FnOnce() -> C,
    C: Future<Output = Result<(), CE>>,
    CE: Display,
{
    // ---
    let Err(e) = step else {
        return Ok(());
    };

    if let Err(close_err) = close().await {
        log_warn!("amqp: failed to close channel after setup error: {close_err}");
    }
    Err(e.into())
}

struct LapinConnection {
    connection: Connection,
}

#[async_trait::async_trait]
impl AmqpConnection for LapinConnection {
    async fn open_sender(&mut self, address: &str) -> BrokerResult<PendingLink> {
        // ---
        let channel = self.connection.create_channel().await?;
        let confirmed = channel
            .confirm_select(ConfirmSelectOptions::default())
            .await;
        close_on_error(confirmed, || channel.close(200, "Normal shutdown".into())).await?;

        let (tx, rx) = mpsc::channel(2);
        let _ = tx.try_send(LinkEvent::ConnectionOpened);
        let _ = tx.try_send(LinkEvent::Sendable);

        Ok(PendingLink {
            sender: Box::new(LapinSender {
                channel,
                queue: address.to_string(),
            }),
            events: rx,
        })
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.connection.close(200, "Normal shutdown".into()).await?;
        Ok(())
    }
}

struct LapinSender {
    channel: Channel,
    queue: String,
}

#[async_trait::async_trait]
impl AmqpSender for LapinSender {
    async fn send(&mut self, data: Bytes) -> BrokerResult<()> {
        // ---
        let confirmation = self
            .channel
            .basic_publish(
                "".into(),                 // default exchange
                &self.queue,               // routing key = queue name
                BasicPublishOptions::default(),
                &data,
                BasicProperties::default(),
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(format!("amqp: broker rejected message for {}", self.queue).into());
        }
        Ok(())
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.channel.close(200, "Normal shutdown".into()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn tls_override_selects_amqps_scheme() {
        // ---
        let mut options = AmqpConnectOptions {
            host: "rabbit".into(),
            port: 5671,
            username: "u".into(),
            password: "p@ss/word".into(),
            transport: Some("tls".into()),
            reconnect_limit: 0,
        };

        let uri = amqp_uri(&options);
        assert_eq!(uri.scheme, AMQPScheme::AMQPS);
        assert_eq!(uri.authority.userinfo.password, "p@ss/word");
        assert_eq!(uri.authority.port, 5671);

        options.transport = Some("tcp".into());
        assert_eq!(amqp_uri(&options).scheme, AMQPScheme::AMQP);
    }

    #[tokio::test]
    async fn failed_setup_step_closes_channel() {
        // ---
        let closes = &std::sync::atomic::AtomicUsize::new(0);
        let close = move || async move {
            closes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err::<(), _>("already closed")
        };

        let failed = close_on_error(Err("confirm_select refused"), close).await;
        let ok = close_on_error(Ok::<(), &str>(()), close).await;

        assert_eq!(
            failed.expect_err("step error is kept").to_string(),
            "confirm_select refused"
        );
        assert!(ok.is_ok());
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

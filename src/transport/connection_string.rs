//! Message-bus transport authenticated by a connection string.

use std::sync::Arc;

use super::bus;
use crate::{
    //
    log_debug,
    BusClientFactory,
    Deadline,
    Message,
    PublishError,
    Result,
    Transport,
    TransportKind,
};

const KIND: TransportKind = TransportKind::ConnectionString;

/// Publishes through a bus client opened from a connection string.
///
/// Every call opens its own client and sender and closes both before
/// returning.
pub struct ConnectionStringTransport {
    // ---
    connection_string: String,
    bus: Arc<dyn BusClientFactory>,
}

impl ConnectionStringTransport {
    pub fn new(connection_string: impl Into<String>, bus: Arc<dyn BusClientFactory>) -> Self {
        Self {
            connection_string: connection_string.into(),
            bus,
        }
    }
}

#[async_trait::async_trait]
impl Transport for ConnectionStringTransport {
    // ---
    fn kind(&self) -> TransportKind {
        KIND
    }

    async fn publish(&self, queue: &str, message: Message, deadline: &Deadline) -> Result<()> {
        // ---
        let client = deadline
            .guard(KIND, async {
                self.bus
                    .from_connection_string(&self.connection_string)
                    .await
                    .map_err(|e| PublishError::setup(KIND, format!("open client: {e}")))
            })
            .await?;

        log_debug!("[{KIND}] client open, sending to {queue}");

        bus::send_scoped(KIND, client, queue, &message, deadline).await
    }
}

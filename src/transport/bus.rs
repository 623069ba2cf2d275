//! Scoped send over an open message-bus client.
//!
//! Shared by the connection-string and workload-identity transports, which
//! differ only in how the client is opened.

use crate::{
    //
    log_debug,
    log_warn,
    BrokerResult,
    BusClient,
    BusMessage,
    Deadline,
    Message,
    PublishError,
    Result,
    TransportKind,
};

/// Open a sender on `queue`, send `message`, then close the sender and the
/// client.
///
/// Takes ownership of `client`: it is closed on every path out of this
/// function, as is the sender once created. Close failures are logged and
/// never replace the send result.
pub(super) async fn send_scoped(
    kind: TransportKind,
    client: Box<dyn BusClient>,
    queue: &str,
    message: &Message,
    deadline: &Deadline,
) -> Result<()> {
    // ---
    let sender = deadline
        .guard(kind, async {
            client
                .create_sender(queue)
                .await
                .map_err(|e| PublishError::setup(kind, format!("create sender for {queue}: {e}")))
        })
        .await;

    let result = match sender {
        Ok(sender) => {
            let body = BusMessage {
                body: message.text().into_owned(),
            };

            let sent = deadline
                .guard(kind, async {
                    sender
                        .send(body)
                        .await
                        .map_err(|e| PublishError::send(kind, queue, e))
                })
                .await;

            release(kind, "sender", sender.close().await);
            sent
        }
        Err(e) => Err(e),
    };

    release(kind, "client", client.close().await);
    result
}

/// Log the outcome of a close call.
pub(super) fn release(kind: TransportKind, what: &str, closed: BrokerResult<()>) {
    match closed {
        Ok(()) => {
            log_debug!("[{kind}] {what} closed");
        }
        Err(e) => {
            log_warn!("[{kind}] failed to close {what}: {e}");
        }
    }
}

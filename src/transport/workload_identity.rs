//! Message-bus transport authenticated by an ambient workload identity.

use std::sync::Arc;

use super::bus;
use crate::{
    //
    log_debug,
    BusClientFactory,
    CredentialProvider,
    Deadline,
    Message,
    PublishError,
    Result,
    Transport,
    TransportKind,
};

const KIND: TransportKind = TransportKind::WorkloadIdentity;

/// Publishes through a bus client opened against a namespace host with the
/// default credential.
///
/// The namespace host is guaranteed present: selection skips before this
/// transport is built when it is missing.
pub struct WorkloadIdentityTransport {
    // ---
    namespace_host: String,
    bus: Arc<dyn BusClientFactory>,
    credentials: Arc<dyn CredentialProvider>,
}

impl WorkloadIdentityTransport {
    pub fn new(
        namespace_host: impl Into<String>,
        bus: Arc<dyn BusClientFactory>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            namespace_host: namespace_host.into(),
            bus,
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl Transport for WorkloadIdentityTransport {
    // ---
    fn kind(&self) -> TransportKind {
        KIND
    }

    async fn publish(&self, queue: &str, message: Message, deadline: &Deadline) -> Result<()> {
        // ---
        let credential = deadline
            .guard(KIND, async {
                self.credentials
                    .default_credential()
                    .await
                    .map_err(|e| PublishError::setup(KIND, format!("resolve credential: {e}")))
            })
            .await?;

        log_debug!(
            "[{KIND}] using {} credential for {}",
            credential.source(),
            self.namespace_host
        );

        let client = deadline
            .guard(KIND, async {
                self.bus
                    .from_credential(&self.namespace_host, credential)
                    .await
                    .map_err(|e| {
                        PublishError::setup(
                            KIND,
                            format!("open client on {}: {e}", self.namespace_host),
                        )
                    })
            })
            .await?;

        bus::send_scoped(KIND, client, queue, &message, deadline).await
    }
}

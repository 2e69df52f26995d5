//! Job queue status poller. Purely informational: nothing is gated on
//! it, and a failed poll keeps showing the last known counts.

use std::sync::Arc;

use flux_core::status::QueueSnapshot;
use flux_gateway::{Gateway, GatewayError};

use crate::session::{ErrorCategory, ErrorRecord, SessionState};

pub const QUEUE_ERROR_MESSAGE: &str = "Failed to fetch queue status. Please try again later.";

pub struct QueuePoller {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionState>,
}

impl QueuePoller {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<SessionState>) -> Self {
        Self { gateway, session }
    }

    /// Fetch the queue counts and replace the snapshot wholesale.
    pub async fn poll(&self) -> Result<QueueSnapshot, GatewayError> {
        match self.gateway.queue_status().await {
            Ok(snapshot) => {
                tracing::debug!(
                    pending = snapshot.pending,
                    running = snapshot.running,
                    "Queue status updated",
                );
                self.session.set_queue(snapshot);
                self.session.clear_error(ErrorCategory::Queue);
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Queue status poll failed, keeping last snapshot");
                self.session
                    .record_error(ErrorCategory::Queue, ErrorRecord::transient(QUEUE_ERROR_MESSAGE));
                Err(e)
            }
        }
    }
}

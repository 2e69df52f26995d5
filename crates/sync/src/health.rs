//! Periodic availability probe.
//!
//! The resulting [`HealthState`] is the gate every submit and mutation
//! checks before touching the gateway.

use std::sync::Arc;

use flux_core::status::HealthState;
use flux_gateway::Gateway;

use crate::session::{ErrorCategory, ErrorRecord, SessionState};

/// Message recorded while the service is unreachable.
pub const UNAVAILABLE_MESSAGE: &str = "API is currently unavailable. Some features may not work.";

pub struct HealthMonitor {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionState>,
}

impl HealthMonitor {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<SessionState>) -> Self {
        Self { gateway, session }
    }

    /// Probe the service once and record the outcome.
    ///
    /// Never fails: network errors, non-2xx responses and timeouts all
    /// become [`HealthState::Unhealthy`].
    pub async fn probe(&self) -> HealthState {
        let state = match self.gateway.health().await {
            Ok(()) => {
                self.session.clear_error(ErrorCategory::Health);
                HealthState::Healthy
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health probe failed");
                self.session.record_error(
                    ErrorCategory::Health,
                    ErrorRecord::transient(UNAVAILABLE_MESSAGE),
                );
                HealthState::Unhealthy
            }
        };

        if let Some(previous) = self.session.set_health(state) {
            if previous != state {
                tracing::info!(from = %previous, to = %state, "Service health changed");
            }
        }

        state
    }
}

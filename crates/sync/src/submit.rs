//! Generation submission.
//!
//! The submitter only hands jobs to the service. It never waits for or
//! polls its own job: output shows up when the roster synchronizer next
//! sees an identifier it did not know about.

use std::sync::Arc;

use flux_core::error::CoreError;
use flux_core::generation::{parse_bulk_payload, GenerationRequest, ModelVariant};
use flux_gateway::{Gateway, GatewayError};

use crate::notify::Notifier;
use crate::session::{ErrorCategory, ErrorRecord, SessionState};

/// Shown when the service rejects a request without a usable detail.
pub const GENERIC_REJECTION: &str =
    "There was an error generating your image(s). Please try again.";

/// A request the service accepted for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub model: ModelVariant,
    /// Number of generation records sent (1 for single mode).
    pub records: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Health is not confirmed; nothing was sent.
    #[error("Service unavailable")]
    ServiceUnavailable,

    /// Another submission is still outstanding; nothing was sent.
    #[error("A generation request is already being submitted")]
    AlreadySubmitting,

    /// The request failed local validation; nothing was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The service refused the request.
    #[error("{message}")]
    Rejected {
        /// Service-supplied detail, or a generic message.
        message: String,
        #[source]
        source: GatewayError,
    },
}

pub struct GenerationSubmitter {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionState>,
    notifier: Arc<Notifier>,
}

impl GenerationSubmitter {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        session: Arc<SessionState>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            gateway,
            session,
            notifier,
        }
    }

    /// Submit a single or bulk generation request.
    ///
    /// The `generating` flag is raised for the whole call and lowered
    /// before it returns, whatever the outcome.
    pub async fn submit(&self, request: GenerationRequest) -> Result<Accepted, SubmitError> {
        if !self.session.health().is_healthy() {
            return Err(SubmitError::ServiceUnavailable);
        }

        let Some(_generating) = self.session.generating().try_acquire() else {
            return Err(SubmitError::AlreadySubmitting);
        };

        let outcome = self.dispatch(&request).await;

        match &outcome {
            Ok(accepted) => {
                tracing::info!(
                    model = %accepted.model,
                    records = accepted.records,
                    "Generation request accepted",
                );
                self.session.clear_error(ErrorCategory::Generation);
                self.notifier.success(
                    "Image generation started",
                    "Your image(s) are being generated. They will appear in the list when ready.",
                );
            }
            Err(e) => {
                tracing::warn!(model = %request.model(), error = %e, "Generation request failed");
                self.session
                    .record_error(ErrorCategory::Generation, ErrorRecord::persistent(e.to_string()));
            }
        }

        outcome
    }

    /// Validate locally, then pick the endpoint for the request's mode
    /// and model.
    async fn dispatch(&self, request: &GenerationRequest) -> Result<Accepted, SubmitError> {
        match request {
            GenerationRequest::Single { model, params } => {
                params.validate()?;
                self.gateway
                    .generate(*model, params)
                    .await
                    .map_err(rejected)?;
                Ok(Accepted {
                    model: *model,
                    records: 1,
                })
            }
            GenerationRequest::Bulk { model, payload } => {
                let batch = parse_bulk_payload(payload)?;
                self.gateway
                    .generate_bulk(*model, &batch)
                    .await
                    .map_err(rejected)?;
                Ok(Accepted {
                    model: *model,
                    records: batch.len(),
                })
            }
        }
    }
}

fn rejected(source: GatewayError) -> SubmitError {
    let message = source
        .detail()
        .unwrap_or_else(|| GENERIC_REJECTION.to_string());
    SubmitError::Rejected { message, source }
}

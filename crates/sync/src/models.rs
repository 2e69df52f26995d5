//! Model catalog watcher and model install/remove actions.
//!
//! Model management sits beside the core loop: it is polled like the
//! other observers but gates nothing, and its actions are not held back
//! by the health state.

use std::sync::Arc;

use flux_core::catalog::ModelInfo;
use flux_gateway::{Gateway, GatewayError};

use crate::notify::Notifier;
use crate::session::{ErrorCategory, ErrorRecord, SessionState};

pub struct ModelCatalogWatcher {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionState>,
    notifier: Arc<Notifier>,
}

impl ModelCatalogWatcher {
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

    /// Fetch the catalog and replace the session copy.
    ///
    /// A change against a previously fetched catalog is announced once;
    /// the first load is not.
    pub async fn refresh(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let models = match self.gateway.list_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!(error = %e, "Model catalog fetch failed");
                self.session.record_error(
                    ErrorCategory::Models,
                    ErrorRecord::transient("Failed to fetch models"),
                );
                return Err(e);
            }
        };

        self.session.clear_error(ErrorCategory::Models);
        if let Some(Some(previous)) = self.session.set_models(models.clone()) {
            if previous != models {
                tracing::info!(count = models.len(), "Model catalog changed");
                self.notifier.info(
                    "Models updated",
                    "The status of one or more models has changed.",
                );
            }
        }

        Ok(models)
    }

    /// Ask the service to start installing `name`.
    pub async fn install(&self, name: &str) -> Result<(), GatewayError> {
        match self.gateway.install_model(name).await {
            Ok(()) => {
                tracing::info!(model = name, "Model install started");
                self.notifier
                    .success("Model install started", format!("Model {name} download started."));
                self.refresh_after_action().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(model = name, error = %e, "Model install failed");
                self.report_failure(
                    "Model install failed",
                    format!("Failed to start download for model {name}. Please try again."),
                );
                Err(e)
            }
        }
    }

    /// Ask the service to remove the installed model `name`.
    pub async fn remove(&self, name: &str) -> Result<(), GatewayError> {
        match self.gateway.remove_model(name).await {
            Ok(()) => {
                tracing::info!(model = name, "Model removed");
                self.notifier
                    .success("Model removed", format!("Model {name} deleted successfully."));
                self.refresh_after_action().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(model = name, error = %e, "Model removal failed");
                self.report_failure(
                    "Model removal failed",
                    format!("Failed to delete model {name}. Please try again."),
                );
                Err(e)
            }
        }
    }

    /// Pick up the new install state right away instead of on the next tick.
    async fn refresh_after_action(&self) {
        // Failures are already logged and recorded by `refresh`.
        let _ = self.refresh().await;
    }

    /// The next successful refresh clears the recorded error.
    fn report_failure(&self, title: &str, message: String) {
        self.session
            .record_error(ErrorCategory::Models, ErrorRecord::transient(message.clone()));
        self.notifier.error(title, message);
    }
}

//! Delete and download actions on the image roster.
//!
//! The roster is only changed after the service confirms a deletion;
//! a failed delete leaves every identifier where it was so the user can
//! retry. Downloads hand their bytes to a [`SaveTarget`], which is the
//! platform's job (browser download, file on disk, ...).

use std::sync::Arc;

use async_trait::async_trait;
use flux_gateway::{Gateway, GatewayError};

use crate::notify::Notifier;
use crate::session::{ErrorCategory, ErrorRecord, SessionState};

/// File name used for the all-images archive.
pub const ARCHIVE_FILE_NAME: &str = "all_images.zip";

/// Where downloaded content ends up.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    async fn save(&self, file_name: &str, content: Vec<u8>) -> std::io::Result<()>;
}

/// Whether the user confirmed a destructive bulk action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// Health is not confirmed; nothing was sent.
    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Deleting all images requires confirmation")]
    NotConfirmed,

    #[error("There are no images")]
    EmptyRoster,

    /// The identifier is not in the current roster; nothing was sent.
    #[error("Image {0} is not in the current list")]
    UnknownImage(String),

    #[error("A download of all images is already in progress")]
    AlreadyDownloading,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to save download: {0}")]
    Save(#[from] std::io::Error),
}

impl MutationError {
    /// Message for the failure toast: the service detail when there is
    /// one, otherwise `fallback`.
    fn user_message(&self, fallback: String) -> String {
        match self {
            MutationError::Gateway(e) => e.detail().unwrap_or(fallback),
            MutationError::Save(e) => format!("{fallback} ({e})"),
            _ => fallback,
        }
    }
}

pub struct MutationCoordinator {
    gateway: Arc<dyn Gateway>,
    session: Arc<SessionState>,
    notifier: Arc<Notifier>,
    save_target: Arc<dyn SaveTarget>,
}

impl MutationCoordinator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        session: Arc<SessionState>,
        notifier: Arc<Notifier>,
        save_target: Arc<dyn SaveTarget>,
    ) -> Self {
        Self {
            gateway,
            session,
            notifier,
            save_target,
        }
    }

    fn ensure_healthy(&self) -> Result<(), MutationError> {
        if self.session.health().is_healthy() {
            Ok(())
        } else {
            Err(MutationError::ServiceUnavailable)
        }
    }

    fn ensure_not_empty(&self) -> Result<(), MutationError> {
        if self.session.roster_len() == 0 {
            Err(MutationError::EmptyRoster)
        } else {
            Ok(())
        }
    }

    fn ensure_listed(&self, id: &str) -> Result<(), MutationError> {
        if self.session.roster().iter().any(|listed| listed == id) {
            Ok(())
        } else {
            Err(MutationError::UnknownImage(id.to_string()))
        }
    }

    /// Delete one image; the roster drops it only once the service agrees.
    /// Only identifiers in the current roster are sent.
    pub async fn delete_one(&self, id: &str) -> Result<(), MutationError> {
        self.ensure_healthy()?;
        self.ensure_listed(id)?;

        match self.gateway.delete_image(id).await {
            Ok(()) => {
                self.session.remove_image(id);
                self.session.clear_error(ErrorCategory::Delete);
                tracing::info!(image = id, "Image deleted");
                self.notifier
                    .success("Image deleted", format!("{id} has been deleted."));
                Ok(())
            }
            Err(e) => {
                let e = MutationError::from(e);
                tracing::warn!(image = id, error = %e, "Image deletion failed");
                self.report_failure(
                    ErrorCategory::Delete,
                    "Deletion failed",
                    e.user_message(format!("Failed to delete {id}. Please try again.")),
                );
                Err(e)
            }
        }
    }

    /// Delete every image. The caller must have obtained the user's
    /// confirmation first.
    pub async fn delete_all(&self, confirmation: Confirmation) -> Result<(), MutationError> {
        self.ensure_healthy()?;
        if confirmation != Confirmation::Confirmed {
            return Err(MutationError::NotConfirmed);
        }
        self.ensure_not_empty()?;

        match self.gateway.delete_all_images().await {
            Ok(()) => {
                self.session.clear_roster();
                self.session.clear_error(ErrorCategory::Delete);
                tracing::info!("All images deleted");
                self.notifier.success(
                    "All images deleted",
                    "All images have been successfully deleted.",
                );
                Ok(())
            }
            Err(e) => {
                let e = MutationError::from(e);
                tracing::warn!(error = %e, "Deleting all images failed");
                self.report_failure(
                    ErrorCategory::Delete,
                    "Deletion failed",
                    e.user_message("Failed to delete all images. Please try again.".to_string()),
                );
                Err(e)
            }
        }
    }

    /// Download one image and save it under its own name.
    pub async fn download_one(&self, id: &str) -> Result<(), MutationError> {
        self.ensure_healthy()?;
        self.ensure_listed(id)?;

        match self.fetch_and_save(id, self.gateway.download_image(id)).await {
            Ok(size) => {
                self.session.clear_error(ErrorCategory::Download);
                tracing::info!(image = id, bytes = size, "Image downloaded");
                self.notifier
                    .success("Image downloaded", format!("{id} has been downloaded."));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(image = id, error = %e, "Image download failed");
                self.report_failure(
                    ErrorCategory::Download,
                    "Download failed",
                    e.user_message(format!("Failed to download {id}. Please try again.")),
                );
                Err(e)
            }
        }
    }

    /// Download every image as one archive. Only one such download runs
    /// at a time.
    pub async fn download_all(&self) -> Result<(), MutationError> {
        self.ensure_healthy()?;
        self.ensure_not_empty()?;
        let Some(_downloading) = self.session.downloading_all().try_acquire() else {
            return Err(MutationError::AlreadyDownloading);
        };

        let result = self
            .fetch_and_save(ARCHIVE_FILE_NAME, self.gateway.download_all_images())
            .await;

        match result {
            Ok(size) => {
                self.session.clear_error(ErrorCategory::Download);
                tracing::info!(bytes = size, "All images downloaded");
                self.notifier.success(
                    "All images downloaded",
                    "All images have been downloaded as a ZIP file.",
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Downloading all images failed");
                self.report_failure(
                    ErrorCategory::Download,
                    "Download failed",
                    e.user_message("Failed to download all images. Please try again.".to_string()),
                );
                Err(e)
            }
        }
    }

    // ---- private helpers ----

    async fn fetch_and_save(
        &self,
        file_name: &str,
        fetch: impl std::future::Future<Output = Result<Vec<u8>, GatewayError>>,
    ) -> Result<usize, MutationError> {
        let content = fetch.await?;
        let size = content.len();
        self.save_target.save(file_name, content).await?;
        Ok(size)
    }

    fn report_failure(&self, category: ErrorCategory, title: &str, message: String) {
        self.session
            .record_error(category, ErrorRecord::transient(message.clone()));
        self.notifier.error(title, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_gateway_detail() {
        let err = MutationError::Gateway(GatewayError::Api {
            status: 404,
            body: r#"{"detail":"Image not found"}"#.into(),
        });
        assert_eq!(err.user_message("fallback".into()), "Image not found");
    }

    #[test]
    fn user_message_falls_back() {
        let err = MutationError::Gateway(GatewayError::Timeout);
        assert_eq!(err.user_message("fallback".into()), "fallback");

        let err = MutationError::Save(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        assert_eq!(err.user_message("fallback".into()), "fallback (read-only)");
    }
}

use async_trait::async_trait;
use flux_core::catalog::ModelInfo;
use flux_core::generation::{BulkBatch, GenerationParams, ModelVariant};
use flux_core::status::QueueSnapshot;
use flux_core::types::ImageId;

use crate::error::GatewayError;

/// The REST surface of the generation service.
///
/// Implemented over HTTP by [`FluxApi`](crate::FluxApi); tests swap in
/// scripted fakes.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET /health`; any 2xx means healthy.
    async fn health(&self) -> Result<(), GatewayError>;

    /// `GET /images`, in server order.
    async fn list_images(&self) -> Result<Vec<ImageId>, GatewayError>;

    /// `GET /queue`.
    async fn queue_status(&self) -> Result<QueueSnapshot, GatewayError>;

    /// `POST /{model}/generate`.
    async fn generate(
        &self,
        model: ModelVariant,
        params: &GenerationParams,
    ) -> Result<(), GatewayError>;

    /// `POST /{model}/generate/bulk`.
    async fn generate_bulk(&self, model: ModelVariant, batch: &BulkBatch)
        -> Result<(), GatewayError>;

    /// `DELETE /images/{id}`.
    async fn delete_image(&self, id: &str) -> Result<(), GatewayError>;

    /// `DELETE /images/all`.
    async fn delete_all_images(&self) -> Result<(), GatewayError>;

    /// `GET /images/download/{id}`, raw image bytes.
    async fn download_image(&self, id: &str) -> Result<Vec<u8>, GatewayError>;

    /// `GET /images/download_all`, a zip archive.
    async fn download_all_images(&self) -> Result<Vec<u8>, GatewayError>;

    /// `GET /models`.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;

    /// `GET /models/{name}/download`; starts an install on the host.
    async fn install_model(&self, name: &str) -> Result<(), GatewayError>;

    /// `DELETE /models/{name}`.
    async fn remove_model(&self, name: &str) -> Result<(), GatewayError>;
}

//! HTTP client for the Flux generation service.
//!
//! Wraps every endpoint the client orchestrator needs (health, image
//! listing, queue status, generation, deletion, downloads, and model
//! management) using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use flux_core::catalog::ModelInfo;
use flux_core::generation::{BulkBatch, GenerationParams, ModelVariant};
use flux_core::status::QueueSnapshot;
use flux_core::types::ImageId;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::gateway::Gateway;

/// Request timeout applied when none is given.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for a single Flux service instance.
pub struct FluxApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of `GET /images`.
#[derive(Debug, Deserialize)]
struct ImagesResponse {
    images: Vec<ImageId>,
}

impl FluxApi {
    /// Create a client for a Flux service.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:8000`.
    /// * `timeout` - Per-request timeout; an expired request surfaces as
    ///   [`GatewayError::Timeout`].
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Base HTTP URL this client talks to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// URL for a fixed route followed by one caller-supplied name. The
    /// name always stays a single percent-encoded segment, so `/`, `#`
    /// and `?` cannot reach a different route.
    fn resource_url(&self, route: &[&str], name: &str) -> Result<reqwest::Url, GatewayError> {
        if matches!(name, "" | "." | "..") {
            return Err(GatewayError::InvalidPath(name.to_string()));
        }

        let mut url = reqwest::Url::parse(&self.api_url)
            .map_err(|_| GatewayError::InvalidPath(self.api_url.clone()))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidPath(self.api_url.clone()))?
            .pop_if_empty()
            .extend(route)
            .push(name);
        Ok(url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GatewayError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), GatewayError> {
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Read a successful response body as raw bytes.
    async fn read_bytes(response: reqwest::Response) -> Result<Vec<u8>, GatewayError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Gateway for FluxApi {
    async fn health(&self) -> Result<(), GatewayError> {
        let response = self.client.get(self.url("/health")).send().await?;
        Self::check_status(response).await
    }

    async fn list_images(&self) -> Result<Vec<ImageId>, GatewayError> {
        let response = self.client.get(self.url("/images")).send().await?;
        let body: ImagesResponse = Self::parse_response(response).await?;
        Ok(body.images)
    }

    async fn queue_status(&self) -> Result<QueueSnapshot, GatewayError> {
        let response = self.client.get(self.url("/queue")).send().await?;
        Self::parse_response(response).await
    }

    async fn generate(
        &self,
        model: ModelVariant,
        params: &GenerationParams,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(model.endpoints().single))
            .json(params)
            .send()
            .await?;

        Self::check_status(response).await?;
        tracing::debug!(%model, "Generation request accepted");
        Ok(())
    }

    async fn generate_bulk(
        &self,
        model: ModelVariant,
        batch: &BulkBatch,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url(model.endpoints().bulk))
            .json(batch)
            .send()
            .await?;

        Self::check_status(response).await?;
        tracing::debug!(%model, records = batch.len(), "Bulk generation request accepted");
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.resource_url(&["images"], id)?)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn delete_all_images(&self) -> Result<(), GatewayError> {
        let response = self.client.delete(self.url("/images/all")).send().await?;
        Self::check_status(response).await
    }

    async fn download_image(&self, id: &str) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .client
            .get(self.resource_url(&["images", "download"], id)?)
            .send()
            .await?;
        Self::read_bytes(response).await
    }

    async fn download_all_images(&self) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .client
            .get(self.url("/images/download_all"))
            .send()
            .await?;
        Self::read_bytes(response).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let response = self.client.get(self.url("/models")).send().await?;
        Self::parse_response(response).await
    }

    async fn install_model(&self, name: &str) -> Result<(), GatewayError> {
        let mut url = self.resource_url(&["models"], name)?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidPath(self.api_url.clone()))?
            .push("download");
        let response = self.client.get(url).send().await?;
        Self::check_status(response).await
    }

    async fn remove_model(&self, name: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.resource_url(&["models"], name)?)
            .send()
            .await?;
        Self::check_status(response).await
    }
}

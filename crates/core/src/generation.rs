//! Generation request types, model variant endpoint table, and
//! parameter validation.
//!
//! Bounds mirror what the generation service declares for its
//! `/generate` schema so that out-of-range requests are rejected
//! locally instead of round-tripping to the server.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Service-declared bounds
// ---------------------------------------------------------------------------

/// Smallest accepted width or height in pixels.
pub const MIN_DIMENSION: u32 = 64;
/// Largest accepted width or height in pixels.
pub const MAX_DIMENSION: u32 = 2048;
/// Inclusive batch size range.
pub const MIN_BATCH_SIZE: u32 = 1;
pub const MAX_BATCH_SIZE: u32 = 20;
/// Inclusive sampler step range.
pub const MIN_STEPS: u32 = 1;
pub const MAX_STEPS: u32 = 30;

/// Default output size shared by both variants.
const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;

// ---------------------------------------------------------------------------
// Model variant
// ---------------------------------------------------------------------------

/// The closed set of generation model variants exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Dev,
    Schnell,
}

/// Endpoint paths for one model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantEndpoints {
    pub single: &'static str,
    pub bulk: &'static str,
}

const DEV_ENDPOINTS: VariantEndpoints = VariantEndpoints {
    single: "/dev/generate",
    bulk: "/dev/generate/bulk",
};

const SCHNELL_ENDPOINTS: VariantEndpoints = VariantEndpoints {
    single: "/schnell/generate",
    bulk: "/schnell/generate/bulk",
};

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Dev, ModelVariant::Schnell];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelVariant::Dev => "dev",
            ModelVariant::Schnell => "schnell",
        }
    }

    /// Endpoint selection table for this variant.
    pub fn endpoints(self) -> VariantEndpoints {
        match self {
            ModelVariant::Dev => DEV_ENDPOINTS,
            ModelVariant::Schnell => SCHNELL_ENDPOINTS,
        }
    }

    /// Sampler steps the variant is tuned for. Schnell is a distilled
    /// model and needs far fewer steps than dev.
    pub fn default_steps(self) -> u32 {
        match self {
            ModelVariant::Dev => 20,
            ModelVariant::Schnell => 4,
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelVariant::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown model '{s}'. Must be one of: dev, schnell"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Single-mode parameters
// ---------------------------------------------------------------------------

/// Parameters for a single generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
    pub steps: u32,
    /// Fixed seed for reproducible output; random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_seed: Option<u64>,
}

impl GenerationParams {
    /// Parameters pre-filled with the variant's defaults.
    pub fn for_model(model: ModelVariant, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            batch_size: 1,
            steps: model.default_steps(),
            noise_seed: None,
        }
    }

    /// Check every field against the service-declared bounds.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_prompt(&self.prompt)?;
        validate_dimension("width", self.width)?;
        validate_dimension("height", self.height)?;
        validate_range("batch_size", self.batch_size, MIN_BATCH_SIZE, MAX_BATCH_SIZE)?;
        validate_range("steps", self.steps, MIN_STEPS, MAX_STEPS)
    }
}

// ---------------------------------------------------------------------------
// Bulk mode
// ---------------------------------------------------------------------------

/// One record of a bulk payload. Omitted fields take server defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEntry {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_seed: Option<u64>,
}

impl BulkEntry {
    fn validate(&self) -> Result<(), CoreError> {
        validate_prompt(&self.prompt)?;
        if let Some(width) = self.width {
            validate_dimension("width", width)?;
        }
        if let Some(height) = self.height {
            validate_dimension("height", height)?;
        }
        if let Some(batch_size) = self.batch_size {
            validate_range("batch_size", batch_size, MIN_BATCH_SIZE, MAX_BATCH_SIZE)?;
        }
        if let Some(steps) = self.steps {
            validate_range("steps", steps, MIN_STEPS, MAX_STEPS)?;
        }
        Ok(())
    }
}

/// A parsed and validated bulk payload, serialized as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BulkBatch(Vec<BulkEntry>);

impl BulkBatch {
    pub fn entries(&self) -> &[BulkEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse user-supplied bulk text into a validated [`BulkBatch`].
///
/// Malformed JSON, a non-array document, an empty array, or any record
/// with an out-of-range field is a validation error.
pub fn parse_bulk_payload(text: &str) -> Result<BulkBatch, CoreError> {
    let document: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| CoreError::Validation(format!("Bulk payload is not valid JSON: {e}")))?;

    if !document.is_array() {
        return Err(CoreError::Validation(
            "Bulk payload must be a JSON array of generation records".to_string(),
        ));
    }

    let entries: Vec<BulkEntry> = serde_json::from_value(document)
        .map_err(|e| CoreError::Validation(format!("Invalid bulk record: {e}")))?;

    if entries.is_empty() {
        return Err(CoreError::Validation(
            "Bulk payload must contain at least one record".to_string(),
        ));
    }

    for (index, entry) in entries.iter().enumerate() {
        entry
            .validate()
            .map_err(|e| CoreError::Validation(format!("Record {index}: {e}")))?;
    }

    Ok(BulkBatch(entries))
}

// ---------------------------------------------------------------------------
// Request envelope
// ---------------------------------------------------------------------------

/// What the user asked the submitter to send.
///
/// Bulk payloads stay raw until submission so that parse failures are
/// reported by the submitter as local validation rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Single {
        model: ModelVariant,
        params: GenerationParams,
    },
    Bulk {
        model: ModelVariant,
        payload: String,
    },
}

impl GenerationRequest {
    pub fn model(&self) -> ModelVariant {
        match self {
            GenerationRequest::Single { model, .. } | GenerationRequest::Bulk { model, .. } => {
                *model
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".to_string()));
    }
    Ok(())
}

fn validate_dimension(field: &str, value: u32) -> Result<(), CoreError> {
    validate_range(field, value, MIN_DIMENSION, MAX_DIMENSION)
}

fn validate_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), CoreError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

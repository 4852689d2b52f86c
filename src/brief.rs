//! Brief generation contract: the generator trait, the upload policy every live
//! generator enforces, the coercion boundary for untrusted responses and the
//! mock fallback policy.

use crate::error::{BriefError, ServiceFailure, GENERIC_FAILURE_MESSAGE};
use crate::models::{DesignBrief, ImageUpload};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const ACCEPTED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[async_trait]
pub trait BriefGenerator: Send + Sync {
    async fn generate(&self, image: &ImageUpload, notes: &str) -> Result<DesignBrief, BriefError>;
}

pub fn check_image_policy(image: &ImageUpload) -> Result<(), BriefError> {
    if image.size() > MAX_IMAGE_BYTES {
        return Err(BriefError::validation("File size exceeds 10MB limit. Please choose a smaller image."));
    }
    let mime = image.mime_type.trim().to_ascii_lowercase();
    if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(BriefError::validation("Invalid file type. Please upload a JPEG, PNG, or WebP image."));
    }
    Ok(())
}

/// Response schema sent with every live request.
pub fn design_brief_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "style": { "type": "STRING", "description": "e.g., 'Minimalist', 'Bohemian', 'Classic'" },
            "garmentType": { "type": "STRING", "description": "The type of clothing, e.g., 'A-line dress', 'Wide-leg trousers'" },
            "keyFeatures": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Distinctive details, e.g., 'Puff sleeves', 'Asymmetrical hemline'"
            },
            "suggestedFabrics": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Suitable fabrics, e.g., 'Silk', 'Linen', 'Cotton'"
            },
            "occasion": { "type": "STRING", "description": "e.g., 'Casual outing', 'Formal event', 'Summer wedding'" },
            "summary": { "type": "STRING", "description": "A one-paragraph summary of design concept." }
        },
        "required": ["style", "garmentType", "keyFeatures", "suggestedFabrics", "occasion", "summary"]
    })
}

/// Turn an untrusted generator response into a [`DesignBrief`].
///
/// Scalars are coerced to strings (missing or null becomes empty), list fields
/// become string sequences (missing or non-array becomes empty). Anything that
/// is not a JSON object is a decoding error.
pub fn coerce_brief(raw: &Value) -> Result<DesignBrief, BriefError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| BriefError::malformed(format!("expected a JSON object, got {}", raw)))?;

    let text = |key: &str| obj.get(key).map(coerce_scalar).unwrap_or_default();
    let list = |key: &str| match obj.get(key) {
        Some(Value::Array(items)) => items.iter().map(coerce_scalar).collect(),
        _ => Vec::new(),
    };

    Ok(DesignBrief {
        style: text("style"),
        garment_type: text("garmentType"),
        occasion: text("occasion"),
        summary: text("summary"),
        key_features: list("keyFeatures"),
        suggested_fabrics: list("suggestedFabrics"),
    })
}

fn coerce_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tries the live generator and substitutes the mock only when the live one
/// reports it is not configured. Every other failure propagates untouched.
pub struct FallbackBriefGenerator {
    live: Arc<dyn BriefGenerator>,
    mock: Arc<dyn BriefGenerator>,
}

impl FallbackBriefGenerator {
    pub fn new(live: Arc<dyn BriefGenerator>, mock: Arc<dyn BriefGenerator>) -> Self {
        Self { live, mock }
    }
}

#[async_trait]
impl BriefGenerator for FallbackBriefGenerator {
    async fn generate(&self, image: &ImageUpload, notes: &str) -> Result<DesignBrief, BriefError> {
        match self.live.generate(image, notes).await {
            Err(e) if e.is_configuration() => {
                warn!("Using mock design brief: {}", e);
                match self.mock.generate(image, notes).await {
                    Err(inner) if inner.is_configuration() => {
                        Err(BriefError::service(ServiceFailure::Other, inner.to_string()))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }
}

/// Run one generation attempt with an upper bound on how long it may take.
pub async fn generate_with_timeout(
    generator: &dyn BriefGenerator,
    image: &ImageUpload,
    notes: &str,
    timeout: Duration,
) -> Result<DesignBrief, BriefError> {
    info!("Generating design brief for '{}' ({} bytes)", image.filename, image.size());
    match tokio::time::timeout(timeout, generator.generate(image, notes)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Design brief generation timed out after {:?}", timeout);
            Err(BriefError::service(ServiceFailure::Timeout, GENERIC_FAILURE_MESSAGE))
        }
    }
}

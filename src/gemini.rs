use crate::brief::{check_image_policy, coerce_brief, design_brief_schema, BriefGenerator};
use crate::error::{BriefError, ServiceFailure, GENERIC_FAILURE_MESSAGE};
use crate::models::{DesignBrief, ImageUpload};
use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Where the live generator reads its API key from. Consulted on every call so a
/// key added or rotated at runtime takes effect without a restart.
pub trait CredentialSource: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn api_key(&self) -> Option<String> {
        let key = std::env::var(&self.var).ok()?;
        let key = key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}

pub struct StaticCredential(pub Option<String>);

impl CredentialSource for StaticCredential {
    fn api_key(&self) -> Option<String> {
        self.0.as_deref().map(str::trim).filter(|k| !k.is_empty()).map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_API_BASE.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

// Truncate base64 payloads in JSON so request bodies stay readable in logs
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

pub fn build_brief_prompt(notes: &str) -> String {
    let notes = if notes.trim().is_empty() { "No additional notes provided." } else { notes };
    format!(
        "Analyze the provided image of an outfit and the user's notes to create a detailed design brief. \
         Be creative but ground your analysis in the visual evidence. User notes: \"{notes}\""
    )
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, settings: &GeminiSettings) -> Result<Self, BriefError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| BriefError::service(ServiceFailure::Transport, e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    async fn perform_api_call(&self, request_body: &serde_json::Value) -> Result<GeminiResponse, BriefError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let mut logged = request_body.clone();
        truncate_base64_in_json(&mut logged);
        debug!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .json(request_body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        let response_text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(classify_http_failure(status, &response_text));
        }

        debug!("📥 Raw Gemini API response: {}", response_text);
        serde_json::from_str(&response_text)
            .map_err(|e| BriefError::malformed(format!("parse error: {}: {}", e, response_text)))
    }

    pub async fn generate_brief(&self, image: &ImageUpload, notes: &str) -> Result<DesignBrief, BriefError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
        let request_body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": image.mime_type, "data": encoded } },
                    { "text": build_brief_prompt(notes) }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": design_brief_schema()
            }
        });

        let parsed = self.perform_api_call(&request_body).await?;
        let text = extract_brief_text(&parsed)?;
        let raw: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| BriefError::malformed(format!("brief is not JSON: {}: {}", e, text)))?;
        let brief = coerce_brief(&raw)?;
        info!("✅ Design brief generated: {} / {}", brief.style, brief.garment_type);
        Ok(brief)
    }
}

fn transport_error(e: reqwest::Error) -> BriefError {
    error!("❌ Gemini transport failure: {}", e);
    let kind = if e.is_timeout() { ServiceFailure::Timeout } else { ServiceFailure::Transport };
    BriefError::service(kind, GENERIC_FAILURE_MESSAGE)
}

fn classify_http_failure(status: StatusCode, body: &str) -> BriefError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return BriefError::quota();
    }
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = envelope.error.message.to_lowercase();
        if envelope.error.status.as_deref() == Some("RESOURCE_EXHAUSTED") || message.contains("quota") {
            return BriefError::quota();
        }
        if message.contains("safety") {
            return BriefError::safety();
        }
    }
    BriefError::service(ServiceFailure::Other, GENERIC_FAILURE_MESSAGE)
}

fn extract_brief_text(resp: &GeminiResponse) -> Result<String, BriefError> {
    if let Some(reason) = resp.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
        info!("⚠️ Prompt blocked by the service: {}", reason);
        return Err(BriefError::safety());
    }
    let candidate = resp
        .candidates
        .first()
        .ok_or_else(|| BriefError::malformed("no candidates in response"))?;
    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            info!("⚠️ Candidate stopped by the service: {}", reason);
            return Err(BriefError::safety());
        }
    }
    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            Part::Other(_) => None,
        })
        .collect();
    if text.trim().is_empty() {
        return Err(BriefError::malformed("no text content in response"));
    }
    Ok(text)
}

/// Live [`BriefGenerator`] backed by the Gemini `generateContent` endpoint.
pub struct GeminiBriefGenerator {
    settings: GeminiSettings,
    credentials: Arc<dyn CredentialSource>,
    cached: Mutex<Option<Arc<GeminiClient>>>,
}

impl GeminiBriefGenerator {
    pub fn new(settings: GeminiSettings, credentials: Arc<dyn CredentialSource>) -> Self {
        Self { settings, credentials, cached: Mutex::new(None) }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.api_key().is_some()
    }

    /// Reuse the client built for `api_key`, rebuilding it only when the key changed.
    fn client_for(&self, api_key: &str) -> Result<Arc<GeminiClient>, BriefError> {
        let mut cached = self.cached.lock();
        if let Some(client) = cached.as_ref().filter(|c| c.api_key() == api_key) {
            return Ok(client.clone());
        }
        info!("Building Gemini client for current credential");
        let client = Arc::new(GeminiClient::new(api_key.to_string(), &self.settings)?);
        *cached = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl BriefGenerator for GeminiBriefGenerator {
    async fn generate(&self, image: &ImageUpload, notes: &str) -> Result<DesignBrief, BriefError> {
        check_image_policy(image)?;
        let api_key = self.credentials.api_key().ok_or_else(BriefError::missing_credential)?;
        let client = self.client_for(&api_key)?;
        client.generate_brief(image, notes).await
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

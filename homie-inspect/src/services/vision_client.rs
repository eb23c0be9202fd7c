//! Vision model client
//!
//! [`VisionAnalysisGateway`] is the seam between the inspection workflows and
//! the multimodal model. [`GeminiVisionClient`] implements it against the
//! Gemini `generateContent` REST endpoint with JSON-schema constrained output.
//!
//! `compare` never shows the expected list to the model while it inventories
//! the tenant's photos. The inventory is taken first, shortfalls are computed
//! locally, and only then is the model asked to phrase a suggestion about the
//! shortfalls it is handed.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::models::{Discrepancy, InventoryItem, PhotoData, RoomFindings};
use crate::services::{discrepancy, inventory_merger};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Vision client errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("At least one photo is required")]
    NoPhotos,

    #[error("Vision model is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Vision API error {0}: {1}")]
    Api(u16, String),

    #[error("Vision model returned unusable output: {0}")]
    Parse(String),

    #[error("Vision model did not answer within {0}s")]
    Timeout(u64),
}

/// Multimodal model operations used by the inventory and inspection flows
#[async_trait]
pub trait VisionAnalysisGateway: Send + Sync {
    /// Inventory the movable objects visible across `photos`
    async fn describe(&self, photos: &[PhotoData]) -> Result<Vec<InventoryItem>, VisionError>;

    /// Find shortfalls of `photos` against `expected`
    async fn compare(
        &self,
        photos: &[PhotoData],
        expected: &[InventoryItem],
    ) -> Result<RoomFindings, VisionError>;
}

/// Settings for [`GeminiVisionClient`]
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiSettings {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Gemini-backed [`VisionAnalysisGateway`]
pub struct GeminiVisionClient {
    http_client: reqwest::Client,
    settings: GeminiSettings,
}

const USER_AGENT: &str = concat!("homie-inspect/", env!("CARGO_PKG_VERSION"));

const INVENTORY_PROMPT: &str = "You are taking a careful inventory of a room for a rental property.
List every distinct movable object visible across all of the photos, with how many of it there are.
Be specific with names (for example \"red leather armchair\" or \"55-inch television\").
Count an object once even if it appears in several photos taken from different angles.
Do not list walls, floors, ceilings, windows, doors or cabinets, nor any of their parts
(window frames, door knobs, hinges, cabinet handles, baseboards, light switches, power outlets).
List only furniture, electronics, appliances, decorations and personal belongings.";

const SUGGESTION_PROMPT: &str = "A tenant photographed a room during a move-out inspection.
Compared with the owner's inventory, the following items were missing or fewer than expected:";

const SUGGESTION_INSTRUCTIONS: &str = "Write one short, polite sentence asking the tenant to re-check a single item from this list.
Prefer an item that is completely missing; among those, prefer the one that sounds most valuable.
Name the item exactly as written above.";

impl GeminiVisionClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, VisionError> {
        if settings.api_key.trim().is_empty() {
            return Err(VisionError::NotConfigured);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| VisionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    async fn generate(&self, body: Value) -> Result<String, VisionError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        );

        tracing::debug!(model = %self.settings.model, "Calling vision model");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VisionError::Timeout(self.settings.timeout.as_secs())
                } else {
                    VisionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::Api(status.as_u16(), error_text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        extract_text(&payload)
    }

    async fn suggest(&self, discrepancies: &[Discrepancy]) -> Result<String, VisionError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": suggestion_prompt(discrepancies) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": suggestion_schema(),
            }
        });
        let text = self.generate(body).await?;
        parse_suggestion(&text)
    }
}

#[async_trait]
impl VisionAnalysisGateway for GeminiVisionClient {
    async fn describe(&self, photos: &[PhotoData]) -> Result<Vec<InventoryItem>, VisionError> {
        if photos.is_empty() {
            return Err(VisionError::NoPhotos);
        }

        let text = self.generate(inventory_request(photos)).await?;
        let items = parse_inventory(&text)?;

        tracing::info!(
            photo_count = photos.len(),
            object_count = items.len(),
            "Vision model described photos"
        );
        Ok(items)
    }

    async fn compare(
        &self,
        photos: &[PhotoData],
        expected: &[InventoryItem],
    ) -> Result<RoomFindings, VisionError> {
        let found = self.describe(photos).await?;
        let discrepancies = discrepancy::reduce(expected, &found);

        if discrepancies.is_empty() {
            return Ok(RoomFindings::default());
        }

        let candidate = match self.suggest(&discrepancies).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Suggestion request failed, using fallback wording");
                None
            }
        };

        Ok(RoomFindings {
            missing_item_suggestion: discrepancy::accept_suggestion(candidate.as_deref(), &discrepancies),
            discrepancies,
        })
    }
}

/// [`VisionAnalysisGateway`] used when no API key is configured
#[derive(Debug, Default, Clone)]
pub struct DisabledVision;

#[async_trait]
impl VisionAnalysisGateway for DisabledVision {
    async fn describe(&self, _photos: &[PhotoData]) -> Result<Vec<InventoryItem>, VisionError> {
        Err(VisionError::NotConfigured)
    }

    async fn compare(
        &self,
        _photos: &[PhotoData],
        _expected: &[InventoryItem],
    ) -> Result<RoomFindings, VisionError> {
        Err(VisionError::NotConfigured)
    }
}

/// Request body asking for an inventory of `photos`
pub fn inventory_request(photos: &[PhotoData]) -> Value {
    let mut parts = vec![json!({ "text": INVENTORY_PROMPT })];
    for photo in photos {
        parts.push(json!({
            "inline_data": {
                "mime_type": photo.mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(&photo.bytes),
            }
        }));
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": inventory_schema(),
        }
    })
}

fn inventory_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "objects": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "count": { "type": "INTEGER" }
                    },
                    "required": ["name", "count"]
                }
            }
        },
        "required": ["objects"]
    })
}

fn suggestion_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": { "suggestion": { "type": "STRING" } },
        "required": ["suggestion"]
    })
}

fn suggestion_prompt(discrepancies: &[Discrepancy]) -> String {
    let mut prompt = String::from(SUGGESTION_PROMPT);
    prompt.push('\n');
    for d in discrepancies {
        prompt.push_str(&format!(
            "- \"{}\": expected {}, found {}\n",
            d.name, d.expected_count, d.actual_count
        ));
    }
    prompt.push_str(SUGGESTION_INSTRUCTIONS);
    prompt
}

/// Concatenated text parts of the first candidate
fn extract_text(payload: &Value) -> Result<String, VisionError> {
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(VisionError::Parse(format!("prompt blocked: {}", reason)));
    }

    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| VisionError::Parse("response has no candidates".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        return Err(VisionError::Parse("response text is empty".to_string()));
    }
    Ok(text)
}

/// Strip a Markdown code fence if the model wrapped its JSON in one
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Deserialize)]
struct RawInventory {
    objects: Vec<RawObject>,
}

#[derive(Deserialize)]
struct RawObject {
    name: String,
    count: Value,
}

/// Parse the model's inventory JSON into a normalized inventory
///
/// Counts may arrive as numbers or numeric strings; non-positive counts and
/// fixtures are dropped. Malformed JSON is an error, never an empty list.
pub fn parse_inventory(text: &str) -> Result<Vec<InventoryItem>, VisionError> {
    let raw: RawInventory = serde_json::from_str(strip_fence(text))
        .map_err(|e| VisionError::Parse(format!("inventory JSON: {}", e)))?;

    let items: Vec<InventoryItem> = raw
        .objects
        .into_iter()
        .filter_map(|o| {
            let count = match &o.count {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            let count = count.round();
            (count >= 1.0).then(|| InventoryItem::new(o.name, count.min(u32::MAX as f64) as u32))
        })
        .collect();

    Ok(inventory_merger::normalize(&discrepancy::without_structural(&items)))
}

#[derive(Deserialize)]
struct RawSuggestion {
    suggestion: String,
}

fn parse_suggestion(text: &str) -> Result<String, VisionError> {
    let raw: RawSuggestion = serde_json::from_str(strip_fence(text))
        .map_err(|e| VisionError::Parse(format!("suggestion JSON: {}", e)))?;
    Ok(raw.suggestion.trim().to_string())
}

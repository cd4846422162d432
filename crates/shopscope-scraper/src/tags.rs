//! Keyword tag inference over an OpenAI-compatible chat completions API.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ScraperError;

/// Marketplace limit on tags per listing.
pub const MAX_TAGS: usize = 13;
/// Marketplace limit on characters per tag.
pub const MAX_TAG_CHARS: usize = 20;

const SYSTEM_PROMPT: &str = "You suggest search tags for marketplace listings. \
Reply with a JSON object {\"tags\": [...]} holding up to 13 tags, most relevant first. \
Each tag is a lowercase phrase of at most 20 characters.";

/// Produces ranked search tags from listing text.
pub trait TagInferrer: Send + Sync {
    fn infer_tags(
        &self,
        title: &str,
        description: &str,
    ) -> impl Future<Output = Result<Vec<String>, ScraperError>> + Send;
}

#[derive(Debug, Clone)]
pub struct TaggerOptions {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

pub struct OpenAiTagger {
    client: reqwest::Client,
    options: TaggerOptions,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: serde_json::Value,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TagPayload {
    #[serde(default)]
    tags: Vec<String>,
}

impl OpenAiTagger {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(options: TaggerOptions) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;
        Ok(Self { client, options })
    }
}

impl std::fmt::Debug for OpenAiTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTagger")
            .field("api_url", &self.options.api_url)
            .field("model", &self.options.model)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl TagInferrer for OpenAiTagger {
    async fn infer_tags(&self, title: &str, description: &str) -> Result<Vec<String>, ScraperError> {
        let request = ChatRequest {
            model: &self.options.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_owned(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Title: {title}\nDescription: {description}"),
                },
            ],
            response_format: json!({ "type": "json_object" }),
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&self.options.api_url)
            .bearer_auth(&self.options.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScraperError::Tagging(format!("tag request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ScraperError::Tagging(format!(
                "tag endpoint returned status {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::Tagging(format!("tag response parse error: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScraperError::Tagging("tag response had no content".to_owned()))?;

        let payload: TagPayload = serde_json::from_str(&content)
            .map_err(|e| ScraperError::Tagging(format!("tag payload is not JSON: {e}")))?;

        Ok(sanitize_tags(payload.tags))
    }
}

/// Trims, drops empty or over-long tags, removes case-insensitive
/// duplicates, and keeps at most [`MAX_TAGS`] in their original rank order.
#[must_use]
pub fn sanitize_tags(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty() && t.chars().count() <= MAX_TAG_CHARS)
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(MAX_TAGS)
        .collect()
}

//! Gemini `generateContent` backend for image generation

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::{BackendError, BackendResponse, ImageBackend, ResponsePart};
use crate::client::Client;

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
}

/// Gemini inline data for images
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String, // base64-encoded
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum PartType {
    Text(String),
    InlineData(InlineData),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) thought: Option<bool>,

    #[serde(flatten)]
    pub(crate) data: PartType,
}

impl Part {
    pub(crate) fn new_text(text: String) -> Self {
        Part {
            thought: None,
            data: PartType::Text(text),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub(crate) role: Option<Role>,
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub(crate) response_modalities: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub(crate) fn image_prompt(prompt: &str) -> Self {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some(Role::User),
                parts: vec![Part::new_text(prompt.to_string())],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub(crate) content: Option<Content>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub(crate) block_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
    #[serde(default)]
    pub(crate) prompt_feedback: Option<PromptFeedback>,
}

impl From<GenerateContentResponse> for BackendResponse {
    fn from(response: GenerateContentResponse) -> Self {
        let block_reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| {
                response
                    .candidates
                    .iter()
                    .filter_map(|c| c.finish_reason.clone())
                    .find(|r| r != "STOP")
            });

        let mut parts = Vec::new();
        for part in response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
        {
            // Thinking output is not part of the answer.
            if part.thought == Some(true) {
                continue;
            }
            match part.data {
                PartType::Text(text) => parts.push(ResponsePart::Text(text)),
                PartType::InlineData(inline) => match BASE64.decode(inline.data.as_bytes()) {
                    Ok(data) => parts.push(ResponsePart::Image {
                        mime_type: inline.mime_type,
                        data,
                    }),
                    Err(e) => warn!("Skipping inline data with invalid base64: {}", e),
                },
            }
        }

        BackendResponse {
            parts,
            block_reason,
        }
    }
}

/// Talks to the Gemini API with a fixed API key.
pub struct GeminiBackend {
    client: Client,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, BackendError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| BackendError::with_status(401, "API key contains invalid characters"))?;
        headers.insert("x-goog-api-key", key);
        Ok(GeminiBackend {
            client: Client::with_headers(headers)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ImageBackend for GeminiBackend {
    async fn generate(&self, model: &str, prompt: &str) -> Result<BackendResponse, BackendError> {
        let request = GenerateContentRequest::image_prompt(prompt);
        let response: GenerateContentResponse = self.client.post(&self.endpoint(model), &request).await?;
        Ok(response.into())
    }
}

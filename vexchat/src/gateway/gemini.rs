//! Generative Language API backend.
//!
//! Non-streaming operations use `models/{model}:generateContent`; streaming
//! chat uses `models/{model}:streamGenerateContent?alt=sse`, whose events each
//! carry one partial `GenerateContentResponse`. The API key travels in the
//! `x-goog-api-key` header.

use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use url::Url;

use vexchat_proto::assist::{Role, Turn};

use super::prompts::{SYSTEM_INSTRUCTION, summary_prompt};
use super::sse::event_stream;
use super::{AiGateway, ChunkStream, GatewayError};
use crate::config::GatewayConfig;

/// Maximum number of response-body bytes kept in an HTTP error.
const MAX_ERROR_BODY: usize = 512;

/// [`AiGateway`] backed by the Generative Language REST API.
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl GeminiGateway {
    /// Builds a gateway from configuration.
    ///
    /// A missing API key is not an error here; every call then fails with
    /// [`GatewayError::Unavailable`] without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the base URL is invalid or
    /// the HTTP client cannot be constructed.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Unavailable(format!("invalid base URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            request_timeout: config.request_timeout,
        })
    }

    /// The model name requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an API key is configured.
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, method: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(&format!("v1beta/models/{}:{method}", self.model))
            .map_err(|e| GatewayError::Unavailable(format!("invalid endpoint: {e}")))
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Unavailable("no API key configured".into()))
    }

    async fn post(
        &self,
        url: Url,
        body: &GenerateRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut request = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key()?)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(GatewayError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn generate(&self, body: &GenerateRequest<'_>) -> Result<String, GatewayError> {
        let url = self.endpoint("generateContent")?;
        let response = self.post(url, body, Some(self.request_timeout)).await?;
        let raw = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&raw)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        parsed.into_text()
    }
}

impl AiGateway for GeminiGateway {
    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        tracing::debug!(model = %self.model, "single-turn completion");
        self.generate(&GenerateRequest::single(prompt)).await
    }

    async fn chat_stream(
        &self,
        history: &[Turn],
        new_message: &str,
    ) -> Result<ChunkStream, GatewayError> {
        let mut url = self.endpoint("streamGenerateContent")?;
        url.query_pairs_mut().append_pair("alt", "sse");

        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|turn| Content::text(Some(turn.role), &turn.text))
            .collect();
        contents.push(Content::text(Some(Role::User), new_message));
        let body = GenerateRequest {
            contents,
            system_instruction: Some(Content::text(None, SYSTEM_INSTRUCTION)),
            generation_config: None,
        };

        tracing::debug!(model = %self.model, turns = history.len(), "opening chat stream");
        // No whole-request timeout here: it would cut long replies short.
        // Stalls are handled by the consumer's per-chunk timeout.
        let response = self.post(url, &body, None).await?;
        let chunks = event_stream(response.bytes_stream()).filter_map(|event| async move {
            match event {
                Ok(payload) => parse_stream_event(&payload).transpose(),
                Err(err) => Some(Err(err)),
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn structured_complete(&self, prompt: &str) -> Result<Vec<String>, GatewayError> {
        let mut body = GenerateRequest::single(prompt);
        body.generation_config = Some(GenerationConfig::string_array());
        let text = self.generate(&body).await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    async fn summarize(&self, transcript: &str) -> Result<String, GatewayError> {
        self.generate(&GenerateRequest::single(&summary_prompt(transcript)))
            .await
    }
}

/// Parses one streamed event into its text delta.
///
/// Returns `Ok(None)` for events that carry no text (e.g. the final
/// usage-metadata event).
fn parse_stream_event(payload: &str) -> Result<Option<String>, GatewayError> {
    let parsed: GenerateResponse = serde_json::from_str(payload)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
    let text = parsed.into_text()?;
    Ok(if text.is_empty() { None } else { Some(text) })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl<'a> GenerateRequest<'a> {
    fn single(prompt: &'a str) -> Self {
        Self {
            contents: vec![Content::text(Some(Role::User), prompt)],
            system_instruction: None,
            generation_config: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(role: Option<Role>, text: &'a str) -> Self {
        Self {
            role: role.map(|r| r.as_str()),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

impl GenerationConfig {
    fn string_array() -> Self {
        Self {
            response_mime_type: "application/json",
            response_schema: serde_json::json!({
                "type": "ARRAY",
                "items": { "type": "STRING" }
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate's parts.
    fn into_text(self) -> Result<String, GatewayError> {
        if let Some(err) = self.error {
            return Err(GatewayError::Rejected(err.message));
        }
        Ok(self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiError {
    message: String,
}

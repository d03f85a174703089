//! Generation service seam and the Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::error::ExplainerError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite-preview-02-05";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Anything that turns a prompt into generated text.
///
/// Implementations must be safe to call from several tasks at once; the
/// batch scheduler keeps up to `batch_size` calls in flight.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ExplainerError>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
    ) -> Result<Self, ExplainerError> {
        let http_client = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("slide-explainer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExplainerError::Client(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();

        tracing::debug!(base_url = %base_url, model = %model, "Created Gemini client");

        Ok(Self {
            http_client,
            base_url,
            model,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ExplainerError> {
        let body = request_body(prompt);

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExplainerError::Status {
                status: status.as_u16(),
                body: truncate_error_body(&text),
            });
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ExplainerError::MalformedResponse(e.to_string()))?;
        parse_response(&value)
    }
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [
            { "parts": [ { "text": prompt } ] }
        ]
    })
}

/// Extracts the generated text from a `generateContent` response body.
///
/// All text parts of the first candidate are concatenated.
pub(crate) fn parse_response(value: &Value) -> Result<String, ExplainerError> {
    if let Some(reason) = value
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(ExplainerError::Blocked(reason.to_string()));
    }

    let candidate = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| ExplainerError::MalformedResponse("no candidates in response".into()))?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string();
        return Err(ExplainerError::EmptyResponse { reason });
    }

    Ok(text)
}

/// Keeps error bodies short enough for logs and stored messages.
fn truncate_error_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

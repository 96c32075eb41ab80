//! LLM provider clients.
//!
//! Each backend implements [`GenerationProvider`] and is selected at rewrite time
//! by the [`ProviderKind`] tag of the credential being tried. Adding a backend
//! means adding a `ProviderKind` variant and one implementation here.
//!
//! - [`OpenRouterProvider`]: OpenAI-compatible chat completions on openrouter.ai
//! - [`GeminiProvider`]: Google Generative Language `generateContent`
//!
//! Providers make exactly one request per call. Retry and fail-over policy lives
//! in [`crate::rewrite::RewriteEngine`].

use crate::error::GenerationError;
use crate::models::ProviderKind;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync + fmt::Debug {
    /// The credential tag this provider serves.
    fn kind(&self) -> ProviderKind;

    /// Send `content` under `system_prompt` using `secret`, returning the raw answer.
    ///
    /// An empty answer is reported as [`GenerationError::EmptyResponse`].
    async fn generate(
        &self,
        system_prompt: &str,
        content: &str,
        secret: &str,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Turn a non-success HTTP response into a [`GenerationError`], pulling the
/// provider's `error.message` (or top-level `message`) out of the body.
async fn status_error(resp: reqwest::Response) -> GenerationError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|env| env.error.and_then(|e| e.message).or(env.message))
        .unwrap_or(body);
    if status == 429 {
        GenerationError::RateLimited(message)
    } else {
        GenerationError::Status { status, message }
    }
}

fn non_empty(answer: Option<String>) -> Result<String, GenerationError> {
    match answer.map(|a| a.trim().to_string()) {
        Some(a) if !a.is_empty() => Ok(a),
        _ => Err(GenerationError::EmptyResponse),
    }
}

/// OpenRouter chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: Client,
    model: String,
    timeout: Duration,
}

impl OpenRouterProvider {
    pub fn new(client: Client, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerationProvider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn generate(
        &self,
        system_prompt: &str,
        content: &str,
        secret: &str,
    ) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": content },
            ],
            "temperature": 0.7,
        });

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(secret)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = status_error(resp).await;
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %err, "OpenRouter call failed");
            return Err(err);
        }

        let completion: ChatCompletion = resp.json().await?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "OpenRouter answered");
        non_empty(
            completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content),
        )
    }
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    model: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(client: Client, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    /// The key travels in a header so it never shows up in the request url.
    fn request(&self, url: &str, secret: &str) -> RequestBuilder {
        self.client
            .post(url)
            .header("x-goog-api-key", secret)
            .timeout(self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        Some(content.parts.into_iter().filter_map(|p| p.text).collect())
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn generate(
        &self,
        system_prompt: &str,
        content: &str,
        secret: &str,
    ) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": format!("{system_prompt}\n\n{content}") }],
            }],
        });

        let resp = self.request(&url, secret).json(&payload).send().await?;

        if !resp.status().is_success() {
            let err = status_error(resp).await;
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %err, "Gemini call failed");
            return Err(err);
        }

        let answer: GeminiResponse = resp.json().await?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "Gemini answered");
        non_empty(answer.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_trims_and_rejects_blank() {
        assert_eq!(non_empty(Some("  yaml \n".into())).unwrap(), "yaml");
        assert!(matches!(
            non_empty(Some("   ".into())),
            Err(GenerationError::EmptyResponse)
        ));
        assert!(matches!(non_empty(None), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_gemini_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("ab"));
    }

    #[test]
    fn test_gemini_without_candidates() {
        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text(), None);
    }

    #[test]
    fn test_chat_completion_shape() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: ChatCompletion = serde_json::from_str(raw).unwrap();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);
        assert_eq!(content.as_deref(), Some("hi"));
    }

    #[test]
    fn test_provider_kinds() {
        let client = Client::new();
        let or = OpenRouterProvider::new(client.clone(), "m", Duration::from_secs(1));
        let ge = GeminiProvider::new(client, "m", Duration::from_secs(1));
        assert_eq!(or.kind(), ProviderKind::OpenRouter);
        assert_eq!(ge.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn test_gemini_key_sent_as_header() {
        let provider = GeminiProvider::new(Client::new(), "gemini-2.0-flash", Duration::from_secs(5));
        let url = format!("{GEMINI_BASE_URL}/gemini-2.0-flash:generateContent");
        let req = provider.request(&url, "sekrit-key").build().unwrap();

        assert!(req.url().query().is_none());
        assert!(!req.url().as_str().contains("sekrit-key"));
        assert_eq!(req.headers()["x-goog-api-key"], "sekrit-key");
    }

}

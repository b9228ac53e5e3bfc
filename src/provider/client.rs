//! HTTP clients for the supported LLM providers.
//!
//! All providers are reached through one [`HttpProvider`] that knows the
//! wire format of each: OpenAI-compatible chat completions (OpenAI, Groq),
//! Anthropic messages and Gemini `generateContent`.

use crate::config::{Config, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Errors returned by a completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No API key configured for provider {0}")]
    MissingApiKey(ProviderKind),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {provider} at {url}")]
    Connect { provider: ProviderKind, url: String },

    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("Failed to send request: {0}")]
    Request(String),

    #[error("Failed to parse {provider} response: {message}")]
    MalformedResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("{0} returned an empty completion")]
    EmptyCompletion(ProviderKind),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::Connect { .. } => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the error comes from local misconfiguration rather than the
    /// provider.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::MissingApiKey(_))
            || matches!(self, ProviderError::Status { status: 401 | 403, .. })
    }
}

/// Something that turns a system prompt and a user prompt into text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Provider name reported by `/health`.
    fn provider_name(&self) -> &str;

    /// Model name recorded on each analysis.
    fn model_name(&self) -> &str;
}

// === Wire formats ===

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI-compatible chat completions request (OpenAI, Groq).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Anthropic messages request.
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Gemini generateContent request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

/// Settings for [`HttpProvider`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub retries: usize,
    /// Delay before the first retry; doubled on each further attempt.
    pub retry_backoff: Duration,
}

impl ProviderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            kind: config.model.provider,
            model: config.model.name.clone(),
            api_key: config.provider_api_key(),
            base_url: config.provider_base_url(),
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
            timeout_seconds: config.model.timeout_seconds,
            retries: config.model.retries,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Completion provider speaking a vendor HTTP API.
pub struct HttpProvider {
    settings: ProviderSettings,
    http_client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        info!(
            "Initializing {} provider with model {} at {}",
            settings.kind, settings.model, settings.base_url
        );

        if settings.api_key.is_none() {
            warn!(
                "No API key for {}; set {} or model.api_key",
                settings.kind,
                settings.kind.api_key_env()
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(ProviderSettings::from_config(config))
    }

    async fn send_once(&self, api_key: &str, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let s = &self.settings;
        match s.kind {
            ProviderKind::OpenAi | ProviderKind::Groq => {
                let url = format!("{}/v1/chat/completions", s.base_url);
                let request = ChatCompletionRequest {
                    model: &s.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                    max_tokens: s.max_tokens,
                    temperature: s.temperature,
                };
                let builder = self.http_client.post(&url).bearer_auth(api_key).json(&request);
                let response: ChatCompletionResponse = self.execute(builder, &url).await?;

                response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ProviderError::EmptyCompletion(s.kind))
            }
            ProviderKind::Anthropic => {
                let url = format!("{}/v1/messages", s.base_url);
                let request = AnthropicRequest {
                    model: &s.model,
                    max_tokens: s.max_tokens,
                    temperature: s.temperature,
                    system,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                let builder = self
                    .http_client
                    .post(&url)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&request);
                let response: AnthropicResponse = self.execute(builder, &url).await?;

                let text: String = response
                    .content
                    .into_iter()
                    .filter(|b| b.block_type == "text")
                    .filter_map(|b| b.text)
                    .collect();
                if text.trim().is_empty() {
                    Err(ProviderError::EmptyCompletion(s.kind))
                } else {
                    Ok(text)
                }
            }
            ProviderKind::Gemini => {
                let url = format!("{}/v1beta/models/{}:generateContent", s.base_url, s.model);
                let request = GeminiRequest {
                    contents: vec![GeminiContent {
                        role: Some("user".to_string()),
                        parts: vec![GeminiPart {
                            text: Some(format!("{}\n\n{}", system, prompt)),
                        }],
                    }],
                    generation_config: GeminiGenerationConfig {
                        temperature: s.temperature,
                        max_output_tokens: s.max_tokens,
                    },
                };
                let builder = self
                    .http_client
                    .post(&url)
                    .header("x-goog-api-key", api_key)
                    .json(&request);
                let response: GeminiResponse = self.execute(builder, &url).await?;

                let text: String = response
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content)
                    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                    .unwrap_or_default();
                if text.trim().is_empty() {
                    Err(ProviderError::EmptyCompletion(s.kind))
                } else {
                    Ok(text)
                }
            }
        }
    }

    /// Send a request and decode a successful JSON body.
    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, ProviderError> {
        let kind = self.settings.kind;
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.settings.timeout_seconds)
            } else if e.is_connect() {
                ProviderError::Connect {
                    provider: kind,
                    url: url.to_string(),
                }
            } else {
                // reqwest appends the request URL to its message
                ProviderError::Request(e.without_url().to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: kind,
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::MalformedResponse {
                provider: kind,
                message: e.without_url().to_string(),
            })
    }
}

#[async_trait]
impl CompletionProvider for HttpProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey(self.settings.kind))?;

        let mut attempt = 0;
        loop {
            debug!(
                "Sending {} request (attempt {}, {} prompt chars)",
                self.settings.kind,
                attempt + 1,
                prompt.len()
            );

            match self.send_once(api_key, system, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.settings.retries => {
                    let delay = self.settings.retry_backoff * 2u32.saturating_pow(attempt as u32);
                    warn!("{} (retrying in {}ms)", e, delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &str {
        self.settings.kind.as_str()
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, RawQuery, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        bodies: Arc<Mutex<Vec<Value>>>,
        headers: Arc<Mutex<Vec<HeaderMap>>>,
        calls: Arc<AtomicUsize>,
        fail_first: usize,
        fail_status: u16,
    }

    impl Recorder {
        fn record(&self, headers: HeaderMap, body: Value) -> Option<StatusCode> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.headers.lock().unwrap().push(headers);
            self.bodies.lock().unwrap().push(body);
            if n < self.fail_first {
                StatusCode::from_u16(self.fail_status).ok()
            } else {
                None
            }
        }
    }

    async fn openai_handler(
        State(rec): State<Recorder>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if let Some(status) = rec.record(headers, body) {
            return (status, Json(json!({"error": "boom"})));
        }
        (
            StatusCode::OK,
            Json(json!({"choices": [{"message": {"role": "assistant", "content": "{\"score\": 90}"}}]})),
        )
    }

    async fn anthropic_handler(
        State(rec): State<Recorder>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        rec.record(headers, body);
        (
            StatusCode::OK,
            Json(json!({"content": [
                {"type": "text", "text": "{\"score\":"},
                {"type": "text", "text": " 80}"}
            ]})),
        )
    }

    async fn gemini_handler(
        State(rec): State<Recorder>,
        Path(model_action): Path<String>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        rec.record(
            headers,
            json!({"model_action": model_action, "query": query, "body": body}),
        );
        (
            StatusCode::OK,
            Json(json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "{\"score\": 70}"}]}}]})),
        )
    }

    async fn spawn_mock(rec: Recorder) -> String {
        let app = Router::new()
            .route("/v1/chat/completions", post(openai_handler))
            .route("/v1/messages", post(anthropic_handler))
            .route("/v1beta/models/:model_action", post(gemini_handler))
            .with_state(rec);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    fn settings(kind: ProviderKind, base_url: String) -> ProviderSettings {
        ProviderSettings {
            kind,
            model: "test-model".to_string(),
            api_key: Some("sk-test".to_string()),
            base_url,
            max_tokens: 256,
            temperature: 0.3,
            timeout_seconds: 5,
            retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_openai_wire_format() {
        let rec = Recorder::default();
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::OpenAi, base)).unwrap();

        let text = provider.complete("be strict", "analyze this").await.unwrap();
        assert_eq!(text, "{\"score\": 90}");

        let body = rec.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be strict");
        assert_eq!(body["messages"][1]["role"], "user");

        let headers = rec.headers.lock().unwrap()[0].clone();
        assert_eq!(headers["authorization"], "Bearer sk-test");
    }

    #[tokio::test]
    async fn test_groq_uses_chat_completions() {
        let rec = Recorder::default();
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::Groq, base)).unwrap();

        assert!(provider.complete("s", "p").await.is_ok());
        assert_eq!(rec.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.provider_name(), "groq");
    }

    #[tokio::test]
    async fn test_anthropic_wire_format() {
        let rec = Recorder::default();
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::Anthropic, base)).unwrap();

        let text = provider.complete("be strict", "analyze this").await.unwrap();
        assert_eq!(text, "{\"score\": 80}");

        let body = rec.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["system"], "be strict");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"].as_array().map(|m| m.len()), Some(1));

        let headers = rec.headers.lock().unwrap()[0].clone();
        assert_eq!(headers["x-api-key"], "sk-test");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
    }

    #[tokio::test]
    async fn test_gemini_wire_format() {
        let rec = Recorder::default();
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::Gemini, base)).unwrap();

        let text = provider.complete("be strict", "analyze this").await.unwrap();
        assert_eq!(text, "{\"score\": 70}");

        let recorded = rec.bodies.lock().unwrap()[0].clone();
        assert_eq!(recorded["model_action"], "test-model:generateContent");
        assert!(recorded["query"].is_null());
        let headers = rec.headers.lock().unwrap()[0].clone();
        assert_eq!(headers["x-goog-api-key"], "sk-test");
        assert_eq!(
            recorded["body"]["contents"][0]["parts"][0]["text"],
            "be strict\n\nanalyze this"
        );
        assert_eq!(recorded["body"]["generationConfig"]["maxOutputTokens"], 256);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let rec = Recorder {
            fail_first: 2,
            fail_status: 503,
            ..Recorder::default()
        };
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::OpenAi, base)).unwrap();

        assert!(provider.complete("s", "p").await.is_ok());
        assert_eq!(rec.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_rate_limited_requests() {
        let rec = Recorder {
            fail_first: 1,
            fail_status: 429,
            ..Recorder::default()
        };
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::OpenAi, base)).unwrap();

        assert!(provider.complete("s", "p").await.is_ok());
        assert_eq!(rec.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let rec = Recorder {
            fail_first: 10,
            fail_status: 500,
            ..Recorder::default()
        };
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::OpenAi, base)).unwrap();

        let err = provider.complete("s", "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
        assert_eq!(rec.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let rec = Recorder {
            fail_first: 10,
            fail_status: 400,
            ..Recorder::default()
        };
        let base = spawn_mock(rec.clone()).await;
        let provider = HttpProvider::new(settings(ProviderKind::OpenAi, base)).unwrap();

        let err = provider.complete("s", "p").await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(rec.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut s = settings(ProviderKind::OpenAi, "http://127.0.0.1:9".to_string());
        s.api_key = None;
        let provider = HttpProvider::new(s).unwrap();

        let err = provider.complete("s", "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey(ProviderKind::OpenAi)));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_send_errors_do_not_expose_api_key() {
        // Accept connections and hang up before answering
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        for kind in [ProviderKind::Gemini, ProviderKind::OpenAi, ProviderKind::Anthropic] {
            let mut s = settings(kind, format!("http://{}", addr));
            s.retries = 0;
            let provider = HttpProvider::new(s).unwrap();

            let err = provider.complete("s", "p").await.unwrap_err();
            let message = err.to_string();
            assert!(!message.contains("sk-test"), "{} leaked the key: {}", kind, message);
            assert!(!message.contains("?key="), "{}", message);
        }
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("abc", 3), "abc");
    }
}

use async_trait::async_trait;
use log::debug;
use nightwhisper_core::{CompletionError, TextCompletion};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "mistralai/Mistral-Nemo-Instruct-2407";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request body. Carries both the bare prompt and a chat-completions message
/// list so either kind of proxy can serve it.
#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

impl<'a> ProxyRequest<'a> {
    fn new(prompt: &'a str, model: &'a str) -> Self {
        Self {
            prompt,
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.65,
            max_tokens: 260,
            presence_penalty: 0.55,
            frequency_penalty: 0.55,
        }
    }
}

/// Text completion over an HTTP proxy.
pub struct HttpCompletion {
    url: String,
    model: String,
    http_client: reqwest::Client,
}

impl HttpCompletion {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be initialised (e.g. no TLS backend).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("nightwhisper-cli/0.1")
            .build()?;
        Ok(Self {
            url: url.into(),
            model: DEFAULT_MODEL.to_string(),
            http_client,
        })
    }
}

/// Pull the reply text out of a proxy response: chat-completions shape first,
/// then a flat `text` field.
pub fn extract_text(payload: &Value) -> Option<String> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| payload.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TextCompletion for HttpCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = ProxyRequest::new(prompt, &self.model);
        debug!("POST {} ({} prompt bytes)", self.url, prompt.len());

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CompletionError::Status(response.status().as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        Ok(extract_text(&payload).unwrap_or_default())
    }
}

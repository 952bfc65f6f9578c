//! Vision-language inference client
//!
//! Sends one image plus a text prompt to an OpenAI-compatible
//! chat-completions endpoint and returns the assistant's text.
//!
//! A response that parses as JSON but lacks `choices[0].message.content`
//! is reported as [`Completion::Malformed`], not as an error. Transport
//! failures, timeouts, non-success statuses and unparseable bodies are errors.

use async_trait::async_trait;
use fedreg_common::config::InferenceConfig;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Inference client errors
#[derive(Debug, Error)]
pub enum InferenceError {
    /// No endpoint configured
    #[error("Inference endpoint not configured")]
    NotConfigured,

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("Inference API returned HTTP {0}: {1}")]
    Status(u16, String),

    /// Body was not JSON
    #[error("Failed to parse inference response: {0}")]
    Parse(String),
}

/// One inference call
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub image_base64: String,
    /// MIME type placed in the data URL, e.g. `image/png`
    pub mime_type: String,
    pub prompt: String,
    pub model: String,
}

/// Outcome of a successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Content(String),
    Malformed,
}

/// Vision-language model endpoint
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, request: &InferenceRequest) -> Result<Completion, InferenceError>;
}

/// HTTP client for chat-completions endpoints
pub struct HttpInferenceClient {
    client: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl HttpInferenceClient {
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fedreg/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn infer(&self, request: &InferenceRequest) -> Result<Completion, InferenceError> {
        let url = self.api_url.as_deref().ok_or(InferenceError::NotConfigured)?;
        let body = build_request_body(request, self.max_tokens, self.temperature);

        debug!(url = %url, model = %request.model, "Calling inference API");

        let mut http_request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status(status.as_u16(), text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| InferenceError::Parse(e.to_string()))?;

        let completion = extract_completion(&value);
        info!(
            model = %request.model,
            malformed = matches!(completion, Completion::Malformed),
            "Inference completed"
        );
        Ok(completion)
    }
}

/// Chat-completions payload: one user message with the image then the prompt
pub fn build_request_body(request: &InferenceRequest, max_tokens: u32, temperature: f32) -> Value {
    json!({
        "model": request.model,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!(
                                "data:{};base64,{}",
                                request.mime_type, request.image_base64
                            )
                        }
                    },
                    {
                        "type": "text",
                        "text": request.prompt
                    }
                ]
            }
        ],
        "parameters": {
            "max_tokens": max_tokens,
            "temperature": temperature
        }
    })
}

/// Pull `choices[0].message.content` out of a response body
///
/// Content given as an array of parts has its `text` parts joined.
pub fn extract_completion(body: &Value) -> Completion {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"));

    match content {
        Some(Value::String(text)) => Completion::Content(text.clone()),
        Some(Value::Array(parts)) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                Completion::Malformed
            } else {
                Completion::Content(texts.join("\n"))
            }
        }
        _ => Completion::Malformed,
    }
}

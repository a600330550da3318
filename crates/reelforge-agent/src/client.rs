//! Chat-completion model client.
//!
//! Both the intent router and the scene generator talk to an
//! OpenAI-compatible chat endpoint through the same small trait, so tests
//! can script replies without any network.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use reelforge_core::{ForgeError, ForgeResult};

/// One system+user exchange against a completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> ForgeResult<String>;
}

/// HTTP-backed model client for an OpenAI-compatible `/v1/chat/completions`.
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
    timeout_ms: u64,
}

impl HttpChatModel {
    /// Build a client from endpoint settings. The API key is read from the
    /// configured environment variable, never stored in config files.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key_env: &str,
        temperature: f64,
        timeout_ms: u64,
    ) -> ForgeResult<Self> {
        let api_key = std::env::var(api_key_env).map_err(|_| {
            ForgeError::Generation(format!("{api_key_env} is not set"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ForgeError::Generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            temperature,
            timeout_ms,
        })
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, system: &str, user: &str) -> ForgeResult<String> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/v1/chat/completions");

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let res = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForgeError::Timeout(self.timeout_ms)
                } else {
                    ForgeError::Generation(format!("completion request failed: {e}"))
                }
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ForgeError::Generation(format!(
                "completion failed: {status}: {text}"
            )));
        }

        let raw: serde_json::Value = res
            .json()
            .await
            .map_err(|e| ForgeError::Generation(format!("invalid completion body: {e}")))?;

        raw.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ForgeError::Generation(
                    "unexpected completion shape (missing choices[0].message.content)".to_string(),
                )
            })
    }
}

/// Strip a markdown code fence if the model wrapped its reply in one.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
